//! Client-hash load balancing strategy.
//!
//! The hash is the 32-bit `h = h * 31 + c` rolling hash over the UTF-16 code
//! units of the client identifier, wrapped to a signed 32-bit integer at
//! every step, with the absolute value taken at the end.

use std::sync::Arc;

use crate::load_balancer::{Backend, LoadBalancer, SelectionContext, ServerRegistry};

/// Maps a client identifier onto the eligible set.
#[derive(Debug, Default)]
pub struct IpHash;

impl IpHash {
    pub fn new() -> Self {
        Self
    }
}

/// Hash a client identifier.
pub fn client_hash(client_id: &str) -> u32 {
    let hash = client_id.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    });
    hash.unsigned_abs()
}

impl LoadBalancer for IpHash {
    fn name(&self) -> &'static str {
        "ip_hash"
    }

    fn next_server(
        &self,
        registry: &ServerRegistry,
        ctx: &SelectionContext<'_>,
    ) -> Option<Arc<Backend>> {
        let eligible = registry.eligible();
        if eligible.is_empty() {
            return None;
        }
        let hash = client_hash(ctx.client_id.unwrap_or_default());
        eligible.get(hash as usize % eligible.len()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::{mark_down, registry};

    fn ctx(id: &str) -> SelectionContext<'_> {
        SelectionContext { client_id: Some(id) }
    }

    #[test]
    fn test_known_hashes() {
        assert_eq!(client_hash(""), 0);
        assert_eq!(client_hash("a"), 97);
        assert_eq!(client_hash("abc"), 96_354);
        // Wraps negative; the absolute value is taken.
        assert_eq!(client_hash("192.168.1.100"), 2_051_273_259);
    }

    #[test]
    fn test_stable_mapping() {
        let lb = IpHash::new();
        let reg = registry(&[("http://a", 1), ("http://b", 1), ("http://c", 1)]);

        let first = lb.next_server(&reg, &ctx("10.1.2.3")).unwrap();
        for _ in 0..20 {
            let again = lb.next_server(&reg, &ctx("10.1.2.3")).unwrap();
            assert_eq!(again.endpoint(), first.endpoint());
        }
    }

    #[test]
    fn test_index_is_hash_modulo_eligible() {
        let lb = IpHash::new();
        let reg = registry(&[("http://a", 1), ("http://b", 1), ("http://c", 1)]);

        // 97 % 3 == 1
        assert_eq!(lb.next_server(&reg, &ctx("a")).unwrap().endpoint(), "http://b");

        // With b out, the eligible set is [a, c]; 97 % 2 == 1
        mark_down(&reg, "http://b");
        assert_eq!(lb.next_server(&reg, &ctx("a")).unwrap().endpoint(), "http://c");
    }

    #[test]
    fn test_missing_client_id_uses_first() {
        let lb = IpHash::new();
        let reg = registry(&[("http://a", 1), ("http://b", 1)]);
        let s = lb.next_server(&reg, &SelectionContext::default()).unwrap();
        assert_eq!(s.endpoint(), "http://a");
    }
}
