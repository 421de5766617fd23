const LOOPBACK: &str = "0.0.0.0";

fn has_port(tail: &str) -> bool {
    tail.starts_with(':') || tail.starts_with("%3A") || tail.starts_with("%3a")
}

fn is_address_char(b: u8) -> bool {
    b.is_ascii_digit() || b == b'.'
}

/// Issued invites may carry the placeholder hub address `0.0.0.0` without a
/// port. Appends `:<port>` to every bare occurrence, in raw or escaped links.
pub fn rewrite_loopback(url: &str, port: u16) -> String {
    let mut out = String::with_capacity(url.len() + 6);
    let mut rest = url;

    while let Some(at) = rest.find(LOOPBACK) {
        let end = at + LOOPBACK.len();
        let (head, tail) = rest.split_at(end);
        out.push_str(head);

        let standalone = (at == 0 || !is_address_char(rest.as_bytes()[at - 1]))
            && !tail.as_bytes().first().is_some_and(|b| b.is_ascii_digit());
        if standalone && !has_port(tail) {
            out.push(':');
            out.push_str(&port.to_string());
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_loopback_gets_port() {
        assert_eq!(
            rewrite_loopback("pzp://invite/join/0.0.0.0/HUB/jt/follow/alice", 3000),
            "pzp://invite/join/0.0.0.0:3000/HUB/jt/follow/alice"
        );
        assert_eq!(
            rewrite_loopback("https://h/invite#pzp%3A%2F%2Finvite%2Fjoin%2F0.0.0.0%2FHUB", 3000),
            "https://h/invite#pzp%3A%2F%2Finvite%2Fjoin%2F0.0.0.0:3000%2FHUB"
        );
    }

    #[test]
    fn test_addresses_with_port_or_other_hosts_untouched() {
        for url in [
            "pzp://invite/join/0.0.0.0:4000/HUB/jt",
            "https://h/invite#join%2F0.0.0.0%3A4000%2FHUB",
            "pzp://invite/join/10.0.0.0/HUB/jt",
            "pzp://invite/join/0.0.0.01/HUB/jt",
            "pzp://invite/follow/alice",
        ] {
            assert_eq!(rewrite_loopback(url, 3000), url);
        }
    }
}
