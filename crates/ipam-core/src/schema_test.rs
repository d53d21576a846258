//! Unit tests for the schema planner

#[cfg(test)]
mod tests {
    use crate::config::IpamConfig;
    use crate::conflict::OverlapType;
    use crate::error::ErrorKind;
    use crate::memory::MemoryStore;
    use crate::models::*;
    use crate::schema::*;
    use crate::store_trait::PoolStore;
    use crate::test_utils::{pool, store_with};
    use tokio_util::sync::CancellationToken;

    fn chain() -> Vec<SchemaEntry> {
        vec![
            SchemaEntry::new("root", "corp", "10.0.0.0/8").with_type("supernet"),
            SchemaEntry::new("eu", "eu-west", "10.1.0.0/16")
                .with_type("region")
                .with_parent("root"),
            SchemaEntry::new("eu-prod", "eu-west-prod", "10.1.0.0/20")
                .with_type("environment")
                .with_parent("eu"),
        ]
    }

    fn request(pools: Vec<SchemaEntry>) -> ApplyRequest {
        ApplyRequest {
            pools,
            skip_conflicts: true,
            ..ApplyRequest::default()
        }
    }

    #[tokio::test]
    async fn test_apply_three_level_chain() {
        let store = MemoryStore::new();
        let config = IpamConfig::default();
        let cancel = CancellationToken::new();

        let report = SchemaPlanner::new(&store, &config)
            .apply(&cancel, &request(chain()))
            .await
            .unwrap();

        assert_eq!(report.created, 3);
        assert_eq!(report.skipped, 0);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
        assert_eq!(report.pool_map.len(), 3);
        assert_eq!(report.root_pool_id, report.pool_map.get("root").copied());

        let pools = store.list_pools(&cancel).await.unwrap();
        let by_name = |name: &str| pools.iter().find(|p| p.name == name).unwrap();
        assert_eq!(by_name("eu-west").parent_id, Some(report.pool_map["root"]));
        assert_eq!(by_name("eu-west-prod").parent_id, Some(report.pool_map["eu"]));
        assert!(pools.iter().all(|p| p.source == PoolSource::SchemaPlanner));
        assert!(pools.iter().all(|p| p.status == PoolStatus::Planned));
        assert_eq!(by_name("corp").pool_type, PoolType::Supernet);
    }

    #[tokio::test]
    async fn test_duplicate_ref_creates_nothing() {
        let store = MemoryStore::new();
        let config = IpamConfig::default();
        let mut pools = chain();
        pools[2].reference = "eu".to_string();

        let err = SchemaPlanner::new(&store, &config)
            .apply(&CancellationToken::new(), &request(pools))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("duplicate ref 'eu'"), "got: {}", err);
        assert_eq!(store.pool_count(), 0);
    }

    #[tokio::test]
    async fn test_parent_ref_to_later_entry_creates_nothing() {
        let store = MemoryStore::new();
        let config = IpamConfig::default();
        let mut pools = chain();
        pools.swap(1, 2);

        let err = SchemaPlanner::new(&store, &config)
            .apply(&CancellationToken::new(), &request(pools))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("earlier entry"), "got: {}", err);
        assert_eq!(store.pool_count(), 0);
    }

    #[tokio::test]
    async fn test_child_outside_parent_creates_nothing() {
        let store = MemoryStore::new();
        let config = IpamConfig::default();
        let mut pools = chain();
        pools[2].cidr = "10.2.0.0/20".to_string();

        let err = SchemaPlanner::new(&store, &config)
            .apply(&CancellationToken::new(), &request(pools))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Containment);
        assert!(err.to_string().contains("pool 'eu-prod'"), "got: {}", err);
        assert_eq!(store.pool_count(), 0);
    }

    #[test]
    fn test_validate_rejects_empty_schema_and_blank_ref() {
        let store = MemoryStore::new();
        let config = IpamConfig::default();
        let planner = SchemaPlanner::new(&store, &config);

        let err = planner.validate(&request(Vec::new())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = planner
            .validate(&request(vec![SchemaEntry::new("  ", "corp", "10.0.0.0/8")]))
            .unwrap_err();
        assert!(err.to_string().contains("pool #1"), "got: {}", err);
    }

    #[test]
    fn test_validate_rejects_invalid_request_status() {
        let store = MemoryStore::new();
        let config = IpamConfig::default();
        let mut req = request(chain());
        req.status = Some("frozen".to_string());

        let err = SchemaPlanner::new(&store, &config).validate(&req).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_validate_rejects_undeclared_internal_overlap() {
        let store = MemoryStore::new();
        let config = IpamConfig::default();
        let mut pools = chain();
        pools.push(SchemaEntry::new("shadow", "shadow", "10.1.0.0/24").with_parent("root"));

        let err = SchemaPlanner::new(&store, &config)
            .validate(&request(pools))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("pool 'shadow'"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_conflict_with_existing_pool_aborts() {
        let store = store_with(vec![pool(1, "legacy", "10.1.0.0/16", None)]);
        let config = IpamConfig::default();
        let req = ApplyRequest {
            pools: chain(),
            ..ApplyRequest::default()
        };

        let err = SchemaPlanner::new(&store, &config)
            .apply(&CancellationToken::new(), &req)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        let types: Vec<_> = err.conflicts().iter().map(|c| c.overlap_type).collect();
        assert_eq!(
            types,
            vec![OverlapType::Contains, OverlapType::Contains, OverlapType::ContainedBy]
        );
        assert_eq!(store.pool_count(), 1);
    }

    #[tokio::test]
    async fn test_skip_conflicts_creates_despite_overlap() {
        let store = store_with(vec![pool(1, "legacy", "10.1.0.0/16", None)]);
        let config = IpamConfig::default();

        let report = SchemaPlanner::new(&store, &config)
            .apply(&CancellationToken::new(), &request(chain()))
            .await
            .unwrap();
        assert_eq!(report.created, 3);
        assert_eq!(store.pool_count(), 4);
    }

    #[tokio::test]
    async fn test_missing_or_unknown_type_warns_and_defaults_to_subnet() {
        let store = MemoryStore::new();
        let config = IpamConfig::default();
        let cancel = CancellationToken::new();
        let pools = vec![
            SchemaEntry::new("a", "untyped", "10.0.0.0/16"),
            SchemaEntry::new("b", "odd", "10.1.0.0/16").with_type("galaxy"),
        ];

        let report = SchemaPlanner::new(&store, &config)
            .apply(&cancel, &request(pools))
            .await
            .unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[1].contains("galaxy"));
        let stored = store.list_pools(&cancel).await.unwrap();
        assert!(stored.iter().all(|p| p.pool_type == PoolType::Subnet));
    }

    #[tokio::test]
    async fn test_last_root_wins() {
        let store = MemoryStore::new();
        let config = IpamConfig::default();
        let pools = vec![
            SchemaEntry::new("first", "first", "10.0.0.0/8").with_type("supernet"),
            SchemaEntry::new("second", "second", "172.16.0.0/12").with_type("supernet"),
            SchemaEntry::new("child", "child", "10.1.0.0/16").with_parent("first"),
        ];

        let report = SchemaPlanner::new(&store, &config)
            .apply(&CancellationToken::new(), &request(pools))
            .await
            .unwrap();

        assert_eq!(report.root_pool_id, Some(report.pool_map["second"]));
    }

    #[tokio::test]
    async fn test_failed_entry_skips_its_descendants() {
        // "corp" collides with an existing name, so its subtree cannot be created
        let store = store_with(vec![pool(1, "corp", "192.168.0.0/16", None)]);
        let config = IpamConfig::default();
        let mut pools = chain();
        pools.push(SchemaEntry::new("lab", "lab", "172.16.0.0/12"));

        let report = SchemaPlanner::new(&store, &config)
            .apply(&CancellationToken::new(), &request(pools))
            .await
            .unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.errors.len(), 3);
        assert_eq!(report.pool_map.keys().collect::<Vec<_>>(), vec!["lab"]);
        assert_eq!(report.root_pool_id, Some(report.pool_map["lab"]));
    }

    #[tokio::test]
    async fn test_request_status_and_tags_applied() {
        let store = MemoryStore::new();
        let config = IpamConfig::default();
        let cancel = CancellationToken::new();
        let mut pools = chain();
        pools[0].tags.insert("team".to_string(), "core".to_string());
        let req = ApplyRequest {
            pools,
            status: Some("active".to_string()),
            tags: Tags::from([
                ("team".to_string(), "netops".to_string()),
                ("env".to_string(), "prod".to_string()),
            ]),
            skip_conflicts: true,
        };

        SchemaPlanner::new(&store, &config).apply(&cancel, &req).await.unwrap();

        let stored = store.list_pools(&cancel).await.unwrap();
        assert!(stored.iter().all(|p| p.status == PoolStatus::Active));
        let root = stored.iter().find(|p| p.name == "corp").unwrap();
        assert_eq!(root.tags["team"], "core");
        assert_eq!(root.tags["env"], "prod");
        let region = stored.iter().find(|p| p.name == "eu-west").unwrap();
        assert_eq!(region.tags["team"], "netops");
    }

    #[tokio::test]
    async fn test_cancelled_apply_fails_before_creating() {
        let store = MemoryStore::new();
        let config = IpamConfig::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let req = ApplyRequest {
            pools: chain(),
            ..ApplyRequest::default()
        };

        let err = SchemaPlanner::new(&store, &config).apply(&cancel, &req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(store.pool_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_create_reports_partial_result() {
        let store = MemoryStore::new();
        let config = IpamConfig::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        // skip_conflicts avoids the list call, so cancellation surfaces in the create loop
        let report = SchemaPlanner::new(&store, &config)
            .apply(&cancel, &request(chain()))
            .await
            .unwrap();

        assert_eq!(report.created, 0);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.errors.len(), 1);
        assert!(report.pool_map.is_empty());
    }

    #[test]
    fn test_apply_request_accepts_explicit_nulls() {
        let req: ApplyRequest = serde_json::from_str(
            r#"{"pools":[{"ref":"root","name":"corp","cidr":"10.0.0.0/8","tags":null}],"status":null,"tags":null,"skip_conflicts":null}"#,
        )
        .unwrap();

        assert_eq!(req.pools.len(), 1);
        assert!(req.pools[0].tags.is_empty());
        assert!(req.status.is_none());
        assert!(req.tags.is_empty());
        assert!(!req.skip_conflicts);

        let empty: ApplyRequest = serde_json::from_str(r#"{"pools":null}"#).unwrap();
        assert!(empty.pools.is_empty());
    }
}
