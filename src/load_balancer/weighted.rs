//! Weighted load balancing strategy.
//!
//! Each pick draws a uniform value in `[0, total_weight)` and walks the
//! eligible backends in order, subtracting weights until the draw falls
//! inside one. Selection frequency converges to `weight / total_weight`.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{Backend, LoadBalancer, SelectionContext, ServerRegistry};

/// Weighted random selector. Weight-0 backends are never chosen.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin;

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self
    }

    /// Pick from `candidates` using `draw`, a value in `[0, total_weight)`.
    fn pick(candidates: &[Arc<Backend>], mut draw: u64) -> Option<Arc<Backend>> {
        for backend in candidates {
            let weight = u64::from(backend.weight());
            if draw < weight {
                return Some(Arc::clone(backend));
            }
            draw -= weight;
        }
        // Reached only by a draw at or past the total weight.
        candidates.first().cloned()
    }
}

impl LoadBalancer for WeightedRoundRobin {
    fn name(&self) -> &'static str {
        "weighted_round_robin"
    }

    fn next_server(
        &self,
        registry: &ServerRegistry,
        _ctx: &SelectionContext<'_>,
    ) -> Option<Arc<Backend>> {
        let eligible = registry.eligible();
        let total: u64 = eligible.iter().map(|b| u64::from(b.weight())).sum();
        if total == 0 {
            return None;
        }

        let draw = rand::thread_rng().gen_range(0..total);
        Self::pick(&eligible, draw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::{mark_down, registry};
    use std::collections::HashMap;

    #[test]
    fn test_pick_boundaries() {
        let reg = registry(&[("http://a", 1), ("http://zero", 0), ("http://b", 3)]);
        let all = reg.all().to_vec();

        assert_eq!(WeightedRoundRobin::pick(&all, 0).unwrap().endpoint(), "http://a");
        assert_eq!(WeightedRoundRobin::pick(&all, 1).unwrap().endpoint(), "http://b");
        assert_eq!(WeightedRoundRobin::pick(&all, 3).unwrap().endpoint(), "http://b");
        // Out-of-range draw falls back to the first eligible backend.
        assert_eq!(WeightedRoundRobin::pick(&all, 99).unwrap().endpoint(), "http://a");
        let reversed: Vec<_> = all.iter().rev().cloned().collect();
        assert_eq!(WeightedRoundRobin::pick(&reversed, 99).unwrap().endpoint(), "http://b");
        assert!(WeightedRoundRobin::pick(&[], 0).is_none());
    }

    #[test]
    fn test_frequency_converges_to_weights() {
        let lb = WeightedRoundRobin::new();
        let reg = registry(&[("http://a", 1), ("http://b", 2), ("http://c", 5), ("http://z", 0)]);

        let samples = 40_000;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..samples {
            let b = lb.next_server(&reg, &SelectionContext::default()).unwrap();
            *counts.entry(b.endpoint().to_string()).or_default() += 1;
        }

        assert!(!counts.contains_key("http://z"));
        for (endpoint, weight) in [("http://a", 1.0), ("http://b", 2.0), ("http://c", 5.0)] {
            let observed = counts[endpoint] as f64 / samples as f64;
            let expected = weight / 8.0;
            assert!(
                (observed - expected).abs() < 0.02,
                "{} observed {:.3} expected {:.3}",
                endpoint,
                observed,
                expected
            );
        }
    }

    #[test]
    fn test_only_eligible_backends() {
        let lb = WeightedRoundRobin::new();
        let reg = registry(&[("http://a", 10), ("http://b", 1)]);
        mark_down(&reg, "http://a");

        for _ in 0..50 {
            let b = lb.next_server(&reg, &SelectionContext::default()).unwrap();
            assert_eq!(b.endpoint(), "http://b");
        }
    }

    #[test]
    fn test_no_weight_left() {
        let lb = WeightedRoundRobin::new();
        let reg = registry(&[("http://a", 0), ("http://b", 4)]);
        mark_down(&reg, "http://b");
        assert!(lb.next_server(&reg, &SelectionContext::default()).is_none());
    }
}
