//! Magnet URI parsing for queue additions.
//!
//! Understands the tiger-tree form used by DC clients:
//! `magnet:?xt=urn:tree:tiger:<39-char base32>&xl=<bytes>&dn=<name>`.

/// Fields extracted from a magnet link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetInfo {
    pub name: String,
    pub size: i64,
    pub tth: String,
}

const XT_PREFIX: &str = "xt=urn:tree:tiger:";
const TTH_LEN: usize = 39;

/// Parse a magnet link. Returns `None` when it carries no tiger-tree
/// hash or the hash is truncated.
pub fn parse_magnet(link: &str) -> Option<MagnetInfo> {
    let xt = link.find(XT_PREFIX)?;
    let rest = &link[xt + XT_PREFIX.len()..];
    let tth: String = rest
        .chars()
        .take_while(|c| *c != '&')
        .collect();
    if tth.len() != TTH_LEN {
        return None;
    }

    let size = param(link, "xl=")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);

    let name = param(link, "dn=")
        .map(|v| percent_decode(&v))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| tth.clone());

    Some(MagnetInfo { name, size, tth })
}

fn param(link: &str, key: &str) -> Option<String> {
    let start = link.find(key)? + key.len();
    let rest = &link[start..];
    let end = rest.find('&').unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

/// Minimal decode of the common display-name escapes: `+` for space and
/// `%XX` byte escapes.
fn percent_decode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '+' => out.push(' '),
            '%' => {
                let hi = chars.next();
                let lo = chars.next();
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        let code = u32::from_str_radix(&format!("{hi}{lo}"), 16).ok();
                        match code.and_then(char::from_u32) {
                            Some(decoded) => out.push(decoded),
                            None => {
                                out.push('%');
                                out.push(hi);
                                out.push(lo);
                            }
                        }
                    }
                    _ => out.push('%'),
                }
            }
            other => out.push(other),
        }
    }
    out
}
