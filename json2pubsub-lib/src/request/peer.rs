/// Extracts the host part of a `host:port` peer address.
///
/// IPv6 hosts must be bracketed (`[::1]:8080`); the brackets are removed. Returns `None` when
/// the port separator is missing or an unbracketed host contains a colon.
pub fn split_host_port(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        if port.contains(':') || host.is_empty() {
            return None;
        }
        return Some(host);
    }

    let (host, _port) = addr.rsplit_once(':')?;
    if host.contains(':') || host.contains('[') || host.contains(']') {
        return None;
    }

    Some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4() {
        assert_eq!(split_host_port("192.168.1.1:1234"), Some("192.168.1.1"));
    }

    #[test]
    fn test_bracketed_ipv6() {
        assert_eq!(split_host_port("[::1]:8080"), Some("::1"));
        assert_eq!(split_host_port("[2001:db8::1]:443"), Some("2001:db8::1"));
    }

    #[test]
    fn test_hostname() {
        assert_eq!(split_host_port("localhost:80"), Some("localhost"));
    }

    #[test]
    fn test_malformed() {
        assert_eq!(split_host_port("192.168.1.1"), None);
        assert_eq!(split_host_port("::1:8080"), None);
        assert_eq!(split_host_port("[::1]8080"), None);
        assert_eq!(split_host_port("[::1"), None);
        assert_eq!(split_host_port(""), None);
    }
}
