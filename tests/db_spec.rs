use std::collections::BTreeMap;

use feed_metadata::db::{Database, NewNode};
use feed_metadata::error::MetadataError;
use feed_metadata::models::*;
use speculate2::speculate;
use uuid::Uuid;

fn create_test_node(db: &Database, node_type: NodeType) -> Node {
    db.create_node(NewNode::new(node_type, None))
        .expect("Failed to create node")
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "nodes" {
        describe "create_node" {
            it "creates a node with properties and references" {
                let category = create_test_node(&db, NodeType::Category);
                let node = db.create_node(
                    NewNode::new(NodeType::Feed, Some(category.id))
                        .property("tba:systemName", "orders")
                        .optional_property("tba:description", None::<String>)
                        .reference("tba:category", category.id),
                ).expect("Failed to create node");

                assert_eq!(node.node_type, NodeType::Feed);
                assert_eq!(node.parent_id, Some(category.id));
                assert_eq!(
                    db.get_property(node.id, "tba:systemName").expect("Query failed"),
                    Some("orders".to_string())
                );
                assert!(db.get_property(node.id, "tba:description").expect("Query failed").is_none());
                assert_eq!(
                    db.get_reference(node.id, "tba:category").expect("Query failed"),
                    Some(category.id)
                );
            }

            it "rejects a reference to a missing node" {
                let result = db.create_node(
                    NewNode::new(NodeType::Feed, None).reference("tba:category", Uuid::new_v4()),
                );
                assert!(result.is_err());
                assert!(db.get_nodes_by_type(NodeType::Feed).expect("Query failed").is_empty());
            }
        }

        describe "get_node" {
            it "returns None for non-existent node" {
                assert!(db.get_node(Uuid::new_v4()).expect("Query failed").is_none());
                assert!(!db.node_exists(Uuid::new_v4()).expect("Query failed"));
            }

            it "returns the node by id" {
                let created = create_test_node(&db, NodeType::Sla);
                let found = db.get_node(created.id).expect("Query failed").expect("Node missing");
                assert_eq!(found.node_type, NodeType::Sla);
                assert!(db.node_exists(created.id).expect("Query failed"));
            }
        }

        describe "get_children" {
            it "returns children of one type in creation order" {
                let feed = create_test_node(&db, NodeType::Feed);
                let first = db.create_node(NewNode::new(NodeType::FeedSource, Some(feed.id))).expect("Failed");
                db.create_node(NewNode::new(NodeType::FeedDestination, Some(feed.id))).expect("Failed");
                let second = db.create_node(NewNode::new(NodeType::FeedSource, Some(feed.id))).expect("Failed");

                let children = db.get_children(feed.id, NodeType::FeedSource).expect("Query failed");
                let ids: Vec<Uuid> = children.iter().map(|n| n.id).collect();
                assert_eq!(ids, vec![first.id, second.id]);
            }
        }

        describe "replace_child_node" {
            it "deletes the previous child" {
                let feed = create_test_node(&db, NodeType::Feed);
                let first = db.replace_child_node(
                    feed.id,
                    "tba:precondition",
                    NewNode::new(NodeType::FeedPrecondition, Some(feed.id)),
                ).expect("Failed to replace");
                let second = db.replace_child_node(
                    feed.id,
                    "tba:precondition",
                    NewNode::new(NodeType::FeedPrecondition, Some(feed.id)),
                ).expect("Failed to replace");

                assert!(!db.node_exists(first.id).expect("Query failed"));
                assert_eq!(
                    db.get_reference(feed.id, "tba:precondition").expect("Query failed"),
                    Some(second.id)
                );
            }
        }
    }

    describe "scalar properties" {
        it "overwrites and removes values" {
            let node = create_test_node(&db, NodeType::Category);
            db.set_property(node.id, "tba:title", Some("Sales")).expect("Failed to set");
            db.set_property(node.id, "tba:title", Some("Revenue")).expect("Failed to set");
            assert_eq!(
                db.get_property(node.id, "tba:title").expect("Query failed"),
                Some("Revenue".to_string())
            );

            db.set_property(node.id, "tba:title", None).expect("Failed to clear");
            assert!(db.get_property(node.id, "tba:title").expect("Query failed").is_none());
        }

        it "reads typed values" {
            const ACTIVE: Property<bool> = Property::new("tba:active");
            const RETRIES: Property<i64> = Property::new("tba:retries");

            let node = create_test_node(&db, NodeType::Feed);
            db.set_typed(node.id, ACTIVE, Some(&true)).expect("Failed to set");
            db.set_typed(node.id, RETRIES, Some(&3)).expect("Failed to set");

            assert_eq!(db.get_typed(node.id, ACTIVE).expect("Query failed"), Some(true));
            assert_eq!(db.get_typed(node.id, RETRIES).expect("Query failed"), Some(3));
        }

        it "reports unreadable typed values" {
            const RETRIES: Property<i64> = Property::new("tba:retries");

            let node = create_test_node(&db, NodeType::Feed);
            db.set_property(node.id, RETRIES.name, Some("many")).expect("Failed to set");

            let err = db.get_typed(node.id, RETRIES).unwrap_err();
            assert!(matches!(err, MetadataError::InvalidInput(_)));
        }

        it "sets several properties at once" {
            let node = create_test_node(&db, NodeType::Feed);
            db.set_property(node.id, "b", Some("old")).expect("Failed to set");
            db.set_properties(node.id, &[("a", Some("1")), ("b", None)]).expect("Failed to set");

            assert_eq!(db.get_property(node.id, "a").expect("Query failed"), Some("1".to_string()));
            assert!(db.get_property(node.id, "b").expect("Query failed").is_none());
        }
    }

    describe "references" {
        it "sets, replaces and clears a reference" {
            let node = create_test_node(&db, NodeType::Feed);
            let first = create_test_node(&db, NodeType::FeedTemplate);
            let second = create_test_node(&db, NodeType::FeedTemplate);

            db.set_reference(node.id, "tba:template", Some(first.id)).expect("Failed");
            db.set_reference(node.id, "tba:template", Some(second.id)).expect("Failed");
            assert_eq!(db.get_reference(node.id, "tba:template").expect("Query failed"), Some(second.id));

            let referencing = db.get_referencing_nodes(second.id, "tba:template").expect("Query failed");
            assert_eq!(referencing.len(), 1);
            assert_eq!(referencing[0].id, node.id);

            db.set_reference(node.id, "tba:template", None).expect("Failed");
            assert!(db.get_reference(node.id, "tba:template").expect("Query failed").is_none());
        }
    }

    describe "set properties" {
        it "keeps insertion order and ignores duplicates" {
            let feed = create_test_node(&db, NodeType::Feed);
            let a = create_test_node(&db, NodeType::Sla);
            let b = create_test_node(&db, NodeType::Sla);

            assert!(db.add_to_set_property(feed.id, "tba:slas", b.id).expect("Failed"));
            assert!(db.add_to_set_property(feed.id, "tba:slas", a.id).expect("Failed"));
            assert!(!db.add_to_set_property(feed.id, "tba:slas", b.id).expect("Failed"));

            assert_eq!(db.get_set_property(feed.id, "tba:slas").expect("Query failed"), vec![b.id, a.id]);
            let nodes = db.get_referenced_node_set(feed.id, "tba:slas").expect("Query failed");
            assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![b.id, a.id]);
        }

        it "removes members" {
            let feed = create_test_node(&db, NodeType::Feed);
            let a = create_test_node(&db, NodeType::Sla);

            db.add_to_set_property(feed.id, "tba:slas", a.id).expect("Failed");
            assert!(db.remove_from_set_property(feed.id, "tba:slas", a.id).expect("Failed"));
            assert!(!db.remove_from_set_property(feed.id, "tba:slas", a.id).expect("Failed"));
            assert!(db.get_set_property(feed.id, "tba:slas").expect("Query failed").is_empty());
        }

        it "replaces the whole set, collapsing duplicates" {
            let feed = create_test_node(&db, NodeType::Feed);
            let a = create_test_node(&db, NodeType::SecurityGroup);
            let b = create_test_node(&db, NodeType::SecurityGroup);
            let c = create_test_node(&db, NodeType::SecurityGroup);

            db.add_to_set_property(feed.id, "tba:securityGroups", a.id).expect("Failed");
            db.replace_set_property(feed.id, "tba:securityGroups", &[c.id, b.id, c.id]).expect("Failed");

            assert_eq!(
                db.get_set_property(feed.id, "tba:securityGroups").expect("Query failed"),
                vec![c.id, b.id]
            );
        }

        it "retains matching members in order" {
            let feed = create_test_node(&db, NodeType::Feed);
            let a = create_test_node(&db, NodeType::Sla);
            let b = create_test_node(&db, NodeType::Sla);
            let c = create_test_node(&db, NodeType::Sla);
            db.replace_set_property(feed.id, "tba:slas", &[a.id, b.id, c.id]).expect("Failed");
            let before = db.get_node(feed.id).expect("Query failed").expect("Missing").modified_at;

            assert!(!db.retain_set_property(feed.id, "tba:slas", |_| true).expect("Failed"));
            assert_eq!(
                db.get_node(feed.id).expect("Query failed").expect("Missing").modified_at,
                before
            );

            assert!(db.retain_set_property(feed.id, "tba:slas", |m| *m != b.id).expect("Failed"));
            assert_eq!(db.get_set_property(feed.id, "tba:slas").expect("Query failed"), vec![a.id, c.id]);

            db.add_to_set_property(feed.id, "tba:slas", b.id).expect("Failed");
            assert_eq!(
                db.get_set_property(feed.id, "tba:slas").expect("Query failed"),
                vec![a.id, c.id, b.id]
            );
        }

        it "leaves the set unchanged when a rewrite fails" {
            let feed = create_test_node(&db, NodeType::Feed);
            let a = create_test_node(&db, NodeType::Sla);
            let b = create_test_node(&db, NodeType::Sla);
            db.replace_set_property(feed.id, "tba:slas", &[a.id, b.id]).expect("Failed");

            let result = db.replace_set_property(feed.id, "tba:slas", &[a.id, Uuid::new_v4()]);
            assert!(matches!(result, Err(MetadataError::Store(_))));
            assert_eq!(db.get_set_property(feed.id, "tba:slas").expect("Query failed"), vec![a.id, b.id]);
        }

        it "drops members whose target is deleted" {
            let feed = create_test_node(&db, NodeType::Feed);
            let sla = create_test_node(&db, NodeType::Sla);
            let precondition = db.replace_child_node(
                feed.id,
                "tba:precondition",
                NewNode::new(NodeType::FeedPrecondition, Some(feed.id)),
            ).expect("Failed");
            db.add_to_set_property(feed.id, "tba:slas", sla.id).expect("Failed");
            db.add_to_set_property(feed.id, "tba:slas", precondition.id).expect("Failed");

            db.replace_child_node(
                feed.id,
                "tba:precondition",
                NewNode::new(NodeType::FeedPrecondition, Some(feed.id)),
            ).expect("Failed");

            assert_eq!(db.get_set_property(feed.id, "tba:slas").expect("Query failed"), vec![sla.id]);
        }
    }

    describe "user properties" {
        it "replaces all user properties and hides system properties" {
            let feed = create_test_node(&db, NodeType::Feed);
            db.set_property(feed.id, "tba:systemName", Some("orders")).expect("Failed");

            let mut first = BTreeMap::new();
            first.insert("owner".to_string(), "data-eng".to_string());
            first.insert("tier".to_string(), "gold".to_string());
            db.set_user_properties(feed.id, &first).expect("Failed");

            let mut second = BTreeMap::new();
            second.insert("owner".to_string(), "analytics".to_string());
            db.set_user_properties(feed.id, &second).expect("Failed");

            assert_eq!(db.get_user_properties(feed.id).expect("Query failed"), second);
            assert_eq!(
                db.get_property(feed.id, "tba:systemName").expect("Query failed"),
                Some("orders".to_string())
            );
        }
    }

    describe "on-disk database" {
        it "persists nodes across connections" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("nested").join("metadata.db");

            let id = {
                let db = Database::open(path.clone()).expect("Failed to open");
                db.migrate().expect("Failed to migrate");
                let node = db.create_node(
                    NewNode::new(NodeType::Category, None).property("tba:systemName", "sales"),
                ).expect("Failed to create");
                node.id
            };

            let reopened = Database::open(path).expect("Failed to reopen");
            reopened.migrate().expect("Failed to migrate");
            assert_eq!(
                reopened.get_property(id, "tba:systemName").expect("Query failed"),
                Some("sales".to_string())
            );
        }
    }
}
