//! Top responders by maximum malicious likelihood.

use crate::analysis::ScoredPopulation;
use crate::config::MAX_TOP_LIMIT;
use crate::context::AppContext;
use crate::encode::ip;
use crate::features::layout::IDX_RESP_HOST;
use ct_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResponder {
    pub id_resp_h: String,
    pub max_malicious_likelihood: f64,
    pub connections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopResponders {
    pub limit: usize,
    pub total_responders: usize,
    pub responders: Vec<RankedResponder>,
}

/// Rank responder hosts of a scored snapshot, highest score first.
///
/// Ties order by address so the ranking is deterministic.
pub fn rank_responders(population: &ScoredPopulation, limit: usize) -> Result<TopResponders> {
    if limit == 0 || limit > MAX_TOP_LIMIT {
        return Err(Error::InvalidParameter {
            name: "limit".to_string(),
            reason: format!("must be in 1..={MAX_TOP_LIMIT}, got {limit}"),
        });
    }

    let mut best: HashMap<u32, (f64, usize)> = HashMap::new();
    for (features, &score) in population.matrix.rows().iter().zip(&population.scores) {
        let host = features.values()[IDX_RESP_HOST] as u32;
        let entry = best.entry(host).or_insert((score, 0));
        entry.0 = entry.0.max(score);
        entry.1 += 1;
    }

    let total_responders = best.len();
    let mut ranked: Vec<(u32, f64, usize)> = best
        .into_iter()
        .map(|(host, (max, count))| (host, max, count))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(limit);

    Ok(TopResponders {
        limit,
        total_responders,
        responders: ranked
            .into_iter()
            .map(|(host, max, connections)| RankedResponder {
                id_resp_h: ip::decode(host),
                max_malicious_likelihood: max,
                connections,
            })
            .collect(),
    })
}

/// Score the context's dataset and rank its responders.
pub fn top_responders(ctx: &AppContext, limit: Option<usize>) -> Result<TopResponders> {
    let limit = limit.unwrap_or(ctx.config().analysis.top_limit);
    let population = ctx.score_population()?;
    rank_responders(&population, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{context, scored};

    fn fixture() -> AppContext {
        context(vec![
            scored("10.0.0.1", "tcp", 1.0, 0.2),
            scored("10.0.0.2", "tcp", 1.0, 0.9),
            scored("10.0.0.1", "udp", 1.0, 0.7),
            scored("10.0.0.3", "tcp", 1.0, 0.7),
            scored("10.0.0.4", "tcp", 1.0, 0.1),
        ])
    }

    #[test]
    fn ranks_by_max_score() {
        let top = top_responders(&fixture(), Some(3)).unwrap();
        assert_eq!(top.total_responders, 4);
        let hosts: Vec<_> = top.responders.iter().map(|r| r.id_resp_h.as_str()).collect();
        // 10.0.0.1 and 10.0.0.3 tie at 0.7; lower address first.
        assert_eq!(hosts, vec!["10.0.0.2", "10.0.0.1", "10.0.0.3"]);
        assert_eq!(top.responders[1].connections, 2);
    }

    #[test]
    fn default_limit_from_config() {
        let top = top_responders(&fixture(), None).unwrap();
        assert_eq!(top.limit, 10);
        assert_eq!(top.responders.len(), 4);
    }

    #[test]
    fn limit_bounds() {
        let ctx = fixture();
        assert!(matches!(
            top_responders(&ctx, Some(0)),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(top_responders(&ctx, Some(MAX_TOP_LIMIT + 1)).is_err());
        assert!(top_responders(&ctx, Some(MAX_TOP_LIMIT)).is_ok());
    }
}
