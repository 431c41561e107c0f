//! Shared CLI argument parsers.

use rex_protocol::rpc::MAX_MACHINE_NAME;
use std::ffi::OsString;

/// Parse an explicit service port. Port 0 is rejected: it would mean
/// "ask the portmapper", which is what omitting `-p` already does.
pub fn parse_service_port(s: &str) -> Result<u16, String> {
    let port: u16 = s
        .parse()
        .map_err(|_| format!("invalid port '{}': expected a number in 1-65535", s))?;
    if port == 0 {
        return Err("invalid port '0': expected a number in 1-65535".to_string());
    }
    Ok(port)
}

/// Parse the machine name placed in the credential.
pub fn parse_machine_name(s: &str) -> Result<String, String> {
    if s.len() > MAX_MACHINE_NAME {
        return Err(format!(
            "hostname too long: {} bytes (max {})",
            s.len(),
            MAX_MACHINE_NAME
        ));
    }
    Ok(s.to_string())
}

/// Raw bytes of a command-line argument, as sent to the remote host.
#[cfg(unix)]
pub fn arg_bytes(arg: OsString) -> Vec<u8> {
    use std::os::unix::ffi::OsStringExt;
    arg.into_vec()
}

/// Raw bytes of a command-line argument, as sent to the remote host.
#[cfg(not(unix))]
pub fn arg_bytes(arg: OsString) -> Vec<u8> {
    arg.to_string_lossy().into_owned().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_port_bounds() {
        assert_eq!(parse_service_port("1"), Ok(1));
        assert_eq!(parse_service_port("512"), Ok(512));
        assert_eq!(parse_service_port("65535"), Ok(65535));
        assert!(parse_service_port("0").is_err());
        assert!(parse_service_port("65536").is_err());
        assert!(parse_service_port("70000").is_err());
    }

    #[test]
    fn test_service_port_rejects_garbage() {
        for bad in ["", "-1", "http", "80x", " 80"] {
            let err = parse_service_port(bad).unwrap_err();
            assert!(err.contains("invalid port"), "{}: {}", bad, err);
        }
    }

    #[test]
    fn test_arg_bytes_plain_text() {
        assert_eq!(arg_bytes(OsString::from("echo 'a  b'")), b"echo 'a  b'".to_vec());
    }

    #[test]
    fn test_machine_name_length() {
        assert_eq!(parse_machine_name("box").unwrap(), "box");
        assert!(parse_machine_name(&"a".repeat(MAX_MACHINE_NAME)).is_ok());
        assert!(parse_machine_name(&"a".repeat(MAX_MACHINE_NAME + 1)).is_err());
    }
}
