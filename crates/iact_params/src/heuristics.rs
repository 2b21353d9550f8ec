//! Name-pattern resolution for auto parameters the constraint service
//! cannot evaluate.

use iact_cloud::{fetch_all, CloudFacade, Parameters, SubnetInfo, DEFAULT_PAGE_SIZE};
use rand::rngs::StdRng;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ResolveError, ResolveResult};
use crate::generate;
use crate::patterns::{KeyKind, KeyPatterns};
use crate::sentinel::{is_auto, is_auto_value, substitute_auto};

/// State of one resolution run. The network pair is looked up at most once
/// and reused by every key that needs it.
pub struct ResolutionContext<'a> {
    facade: &'a dyn CloudFacade,
    patterns: &'a KeyPatterns,
    network: Option<SubnetInfo>,
    rng: StdRng,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(facade: &'a dyn CloudFacade, patterns: &'a KeyPatterns, rng: StdRng) -> Self {
        Self {
            facade,
            patterns,
            network: None,
            rng,
        }
    }

    /// Resolve every unresolved key whose raw value is still the auto sentinel.
    /// Keys matching no pattern keep their raw value.
    pub async fn apply(
        &mut self,
        params: &mut Parameters,
        unresolved: &[String],
        raw: &Parameters,
    ) -> ResolveResult<()> {
        for key in unresolved {
            let Some(raw_value) = raw.get(key).and_then(Value::as_str) else {
                continue;
            };
            if !is_auto(raw_value) {
                continue;
            }

            let Some(kind) = self.patterns.classify(key) else {
                warn!(key = %key, "No resolver matches parameter, leaving placeholder in place");
                params.insert(key.clone(), Value::String(raw_value.to_string()));
                continue;
            };

            let resolved = match kind {
                KeyKind::Subnet => self.network(key, raw_value, params).await?.subnet_id,
                KeyKind::Vpc => self.network(key, raw_value, params).await?.vpc_id,
                KeyKind::Zone => self.network(key, raw_value, params).await?.zone_id,
                KeyKind::Name => generate::common_name(&mut self.rng),
                KeyKind::Password => generate::password(&mut self.rng),
                KeyKind::Uuid => generate::uuid(&mut self.rng),
                KeyKind::SecurityGroup => self.security_group(key, raw_value, params).await?,
            };
            debug!(key = %key, kind = ?kind, "Resolved parameter by name pattern");
            params.insert(key.clone(), Value::String(substitute_auto(raw_value, &resolved)));
        }
        Ok(())
    }

    /// Zone chosen for another zone-like key, if any.
    fn zone_filter(&self, params: &Parameters) -> Option<String> {
        params
            .iter()
            .filter(|(k, v)| self.patterns.is_zone(k) && !is_auto_value(v))
            .find_map(|(_, v)| v.as_str())
            .map(String::from)
    }

    async fn network(
        &mut self,
        key: &str,
        raw_value: &str,
        params: &Parameters,
    ) -> ResolveResult<SubnetInfo> {
        if let Some(pair) = &self.network {
            return Ok(pair.clone());
        }

        let zone = self.zone_filter(params);
        let subnets = self.facade.list_subnets(zone.as_deref()).await?;
        let pair = subnets
            .into_iter()
            .find(|s| s.available_ip_count > 1)
            .ok_or_else(|| ResolveError::Heuristic {
                key: key.to_string(),
                value: raw_value.to_string(),
                message: format!(
                    "can not find any vswitch in zone {}",
                    zone.as_deref().unwrap_or("None")
                ),
            })?;
        debug!(vpc_id = %pair.vpc_id, subnet_id = %pair.subnet_id, "Selected network");
        self.network = Some(pair.clone());
        Ok(pair)
    }

    async fn security_group(
        &mut self,
        key: &str,
        raw_value: &str,
        params: &Parameters,
    ) -> ResolveResult<String> {
        let vpc_id = self.network(key, raw_value, params).await?.vpc_id;
        let facade = self.facade;
        let groups = fetch_all(DEFAULT_PAGE_SIZE, |page| {
            facade.list_security_groups(&vpc_id, page)
        })
        .await?;
        groups
            .into_iter()
            .find(|g| !g.service_managed)
            .map(|g| g.security_group_id)
            .ok_or_else(|| ResolveError::Heuristic {
                key: key.to_string(),
                value: raw_value.to_string(),
                message: format!(
                    "can not find security group in vpc {} in {} region",
                    vpc_id,
                    self.facade.region()
                ),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iact_cloud::{CloudConnector, Credential, MockCloud, SecurityGroupInfo};
    use rand::SeedableRng;
    use serde_json::json;

    fn subnet(id: &str, zone: &str, free: u64) -> SubnetInfo {
        SubnetInfo {
            vpc_id: "vpc-1".into(),
            subnet_id: id.into(),
            zone_id: zone.into(),
            available_ip_count: free,
        }
    }

    fn raw(keys: &[&str]) -> Parameters {
        keys.iter()
            .map(|k| (k.to_string(), json!("$[iact3-auto]")))
            .collect()
    }

    fn unresolved(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn test_network_pair_is_shared() {
        let cloud = MockCloud::new()
            .add_subnet("r1", subnet("vsw-full", "z-a", 1))
            .add_subnet("r1", subnet("vsw-1", "z-a", 20))
            .add_security_group(
                "r1",
                SecurityGroupInfo {
                    security_group_id: "sg-managed".into(),
                    vpc_id: "vpc-1".into(),
                    service_managed: true,
                },
            )
            .add_security_group(
                "r1",
                SecurityGroupInfo {
                    security_group_id: "sg-1".into(),
                    vpc_id: "vpc-1".into(),
                    service_managed: false,
                },
            );
        let facade = cloud.connect("r1", &Credential::default()).unwrap();
        let patterns = KeyPatterns::new().unwrap();
        let mut ctx = ResolutionContext::new(facade.as_ref(), &patterns, StdRng::seed_from_u64(1));

        let keys = ["VpcId", "VSwitchId", "SecurityGroupId", "ZoneId"];
        let raw = raw(&keys);
        let mut params = Parameters::new();
        ctx.apply(&mut params, &unresolved(&keys), &raw).await.unwrap();

        assert_eq!(params["VpcId"], json!("vpc-1"));
        assert_eq!(params["VSwitchId"], json!("vsw-1"));
        assert_eq!(params["SecurityGroupId"], json!("sg-1"));
        assert_eq!(params["ZoneId"], json!("z-a"));
        assert_eq!(cloud.get_method_calls("list_subnets").len(), 1);
    }

    #[tokio::test]
    async fn test_zone_filter_uses_resolved_zone() {
        let cloud = MockCloud::new()
            .add_subnet("r1", subnet("vsw-a", "z-a", 20))
            .add_subnet("r1", subnet("vsw-b", "z-b", 20));
        let facade = cloud.connect("r1", &Credential::default()).unwrap();
        let patterns = KeyPatterns::new().unwrap();
        let mut ctx = ResolutionContext::new(facade.as_ref(), &patterns, StdRng::seed_from_u64(1));

        let mut params = Parameters::new();
        params.insert("ZoneId".into(), json!("z-b"));
        ctx.apply(&mut params, &unresolved(&["VSwitchId"]), &raw(&["VSwitchId"]))
            .await
            .unwrap();

        assert_eq!(params["VSwitchId"], json!("vsw-b"));
        let calls = cloud.get_method_calls("list_subnets");
        assert_eq!(calls[0].target.as_deref(), Some("z-b"));
    }

    #[tokio::test]
    async fn test_zone_filter_skips_unresolved_zone_keys() {
        let cloud = MockCloud::new()
            .add_subnet("r1", subnet("vsw-a", "z-a", 20))
            .add_subnet("r1", subnet("vsw-b", "z-b", 20));
        let facade = cloud.connect("r1", &Credential::default()).unwrap();
        let patterns = KeyPatterns::new().unwrap();
        let mut ctx = ResolutionContext::new(facade.as_ref(), &patterns, StdRng::seed_from_u64(1));

        let mut params = Parameters::new();
        params.insert("MasterZoneId".into(), json!("$[iact3-auto]"));
        params.insert("SlaveZoneId".into(), json!("z-b"));
        let filter = ctx.zone_filter(&params);
        assert_eq!(filter.as_deref(), Some("z-b"));

        ctx.apply(&mut params, &unresolved(&["VSwitchId"]), &raw(&["VSwitchId"]))
            .await
            .unwrap();
        assert_eq!(params["VSwitchId"], json!("vsw-b"));
    }

    #[tokio::test]
    async fn test_missing_network_is_an_error() {
        let cloud = MockCloud::new();
        let facade = cloud.connect("r1", &Credential::default()).unwrap();
        let patterns = KeyPatterns::new().unwrap();
        let mut ctx = ResolutionContext::new(facade.as_ref(), &patterns, StdRng::seed_from_u64(1));

        let mut params = Parameters::new();
        let err = ctx
            .apply(&mut params, &unresolved(&["VpcId"]), &raw(&["VpcId"]))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Parsing pseudo parameter (Key: VpcId"));
    }

    #[tokio::test]
    async fn test_generated_and_unmatched_keys() {
        let cloud = MockCloud::new();
        let facade = cloud.connect("r1", &Credential::default()).unwrap();
        let patterns = KeyPatterns::new().unwrap();
        let mut ctx = ResolutionContext::new(facade.as_ref(), &patterns, StdRng::seed_from_u64(1));

        let keys = ["InstanceName", "DbPassword", "RequestUuid", "InstanceType"];
        let mut params = Parameters::new();
        ctx.apply(&mut params, &unresolved(&keys), &raw(&keys)).await.unwrap();

        assert!(params["InstanceName"].as_str().unwrap().starts_with("iact3-"));
        assert_eq!(params["DbPassword"].as_str().unwrap().chars().count(), 16);
        assert_eq!(params["RequestUuid"].as_str().unwrap().len(), 36);
        assert_eq!(params["InstanceType"], json!("$[iact3-auto]"));
        assert!(!cloud.was_called("list_subnets"));
    }
}
