use anyhow::{Result, bail};
use rand::Rng;

use crate::types::AgentEndpoint;

/// Static, read-only set of chat agent deployments, shared by all sessions.
///
/// One endpoint is designated the transaction-analysis agent: its candidate
/// questions are derived fresh each cycle from live transaction hashes and
/// carried as a per-cycle value (see [`analysis_questions`]) instead of being
/// written back into this registry.
pub struct EndpointRegistry {
    endpoints: Vec<AgentEndpoint>,
    analysis_index: usize,
}

impl EndpointRegistry {
    pub fn new(endpoints: Vec<AgentEndpoint>, analysis_index: usize) -> Result<Self> {
        if endpoints.is_empty() {
            bail!("endpoint registry must contain at least one agent");
        }
        if analysis_index >= endpoints.len() {
            bail!(
                "analysis endpoint index {analysis_index} out of range ({} agents)",
                endpoints.len()
            );
        }
        Ok(Self {
            endpoints,
            analysis_index,
        })
    }

    /// The three Kite testnet agent deployments the campaign targets.
    pub fn kite_defaults() -> Self {
        let endpoints = vec![
            AgentEndpoint {
                url: "https://deployment-uu9y1z4z85rapgwkss1muuiz.stag-vxzy.zettablock.com/main"
                    .to_string(),
                agent_id: "deployment_UU9y1Z4Z85RAPGwkss1mUUiZ".to_string(),
                name: "Kite AI Assistant".to_string(),
            },
            AgentEndpoint {
                url: "https://deployment-ecz5o55dh0dbqagkut47kzyc.stag-vxzy.zettablock.com/main"
                    .to_string(),
                agent_id: "deployment_ECz5O55dH0dBQaGKuT47kzYC".to_string(),
                name: "Crypto Price Assistant".to_string(),
            },
            AgentEndpoint {
                url: "https://deployment-sofftlsf9z4fya3qchykaanq.stag-vxzy.zettablock.com/main"
                    .to_string(),
                agent_id: "deployment_SoFftlsf9z4fyA3QCHYkaANq".to_string(),
                name: "Transaction Analyzer".to_string(),
            },
        ];
        // kite_defaults is non-empty with a valid index, so new() cannot fail.
        Self::new(endpoints, 2).expect("default registry is valid")
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[AgentEndpoint] {
        &self.endpoints
    }

    pub fn analysis_endpoint(&self) -> &AgentEndpoint {
        &self.endpoints[self.analysis_index]
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.name.clone()).collect()
    }

    /// Pick an endpoint uniformly at random.
    pub fn pick<R: Rng>(&self, rng: &mut R) -> &AgentEndpoint {
        &self.endpoints[rng.gen_range(0..self.endpoints.len())]
    }
}

/// Build the per-cycle question pool for the analysis agent from freshly
/// fetched transaction hashes, one templated question per hash.
pub fn analysis_questions(hashes: &[String]) -> Vec<String> {
    hashes
        .iter()
        .map(|hash| format!("Analyze this transaction in detail: {hash}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn defaults_register_three_agents() {
        let registry = EndpointRegistry::kite_defaults();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.analysis_endpoint().name, "Transaction Analyzer");
    }

    #[test]
    fn rejects_empty_registry() {
        assert!(EndpointRegistry::new(Vec::new(), 0).is_err());
    }

    #[test]
    fn rejects_out_of_range_analysis_index() {
        let endpoints = vec![AgentEndpoint {
            url: "http://localhost/main".to_string(),
            agent_id: "a".to_string(),
            name: "A".to_string(),
        }];
        assert!(EndpointRegistry::new(endpoints, 1).is_err());
    }

    #[test]
    fn pick_covers_all_endpoints() {
        let registry = EndpointRegistry::kite_defaults();
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            seen.insert(registry.pick(&mut rng).name.clone());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn analysis_questions_template_per_hash() {
        let hashes = vec!["0xaaa".to_string(), "0xbbb".to_string()];
        let questions = analysis_questions(&hashes);
        assert_eq!(
            questions,
            vec![
                "Analyze this transaction in detail: 0xaaa",
                "Analyze this transaction in detail: 0xbbb",
            ]
        );
        assert!(analysis_questions(&[]).is_empty());
    }
}
