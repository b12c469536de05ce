use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use common::metrics::BRANCH_ERRORS_TOTAL;

use super::domain::{
    BranchError, BuildOutcome, ChildrenData, HierarchyOptions, ParentChain, TreeBranch, TreeNode,
};
use crate::descriptor::EntityType;
use crate::entity::{EntityService, EntityView, SeriesRef};
use crate::errors::ServiceError;
use crate::registry::EntityServiceRegistry;
use crate::store::{Document, Filter};

type BoxedOutcome<'a> = Pin<Box<dyn Future<Output = BuildOutcome> + Send + 'a>>;

/// Tree reads across the chain, resolving every type through the registry.
pub struct HierarchyService {
    registry: Arc<EntityServiceRegistry>,
}

// Only types without children are subject to access filtering.
fn access_filter(entity_type: EntityType, opts: &HierarchyOptions) -> Filter {
    Filter::default().only_active(opts.access_options.filter_active && entity_type.descriptor().filters_inactive())
}

impl HierarchyService {
    pub fn new(registry: Arc<EntityServiceRegistry>) -> Self { Self { registry } }

    /// Build the tree rooted at `id`. A missing or filtered-out root is
    /// `Pruned`; store failures become an inline marker.
    pub async fn build_hierarchy_tree(
        &self,
        entity_type: EntityType,
        id: Uuid,
        opts: &HierarchyOptions,
        current_depth: u32,
    ) -> BuildOutcome {
        let svc = self.registry.get(entity_type);
        let doc = match svc.ensure_exists(id, Some(&access_filter(entity_type, opts))).await {
            Ok(doc) => doc,
            Err(ServiceError::NotFound(_)) => {
                debug!(%entity_type, %id, "branch pruned");
                return BuildOutcome::Pruned;
            }
            Err(e) => return self.branch_error(entity_type, id, e),
        };
        let series = match svc.resolve_series(&doc).await {
            Ok(series) => series,
            Err(e) => return self.branch_error(entity_type, id, e),
        };
        self.build_node(svc, doc, series, opts, current_depth).await
    }

    // Children arrive already fetched and filtered, so recursion starts here
    // rather than at `build_hierarchy_tree`.
    fn build_node<'a>(
        &'a self,
        svc: Arc<EntityService>,
        doc: Document,
        series: Option<SeriesRef>,
        opts: &'a HierarchyOptions,
        depth: u32,
    ) -> BoxedOutcome<'a> {
        Box::pin(async move {
            let (entity_type, id) = (svc.entity_type(), doc.id);
            let child_series = if svc.descriptor().is_root() { Some(SeriesRef::of(&doc)) } else { series.clone() };
            let view = svc.format_with(doc, series, opts.language.as_deref());

            if opts.max_depth.is_some_and(|max| depth >= max) {
                return BuildOutcome::Found(TreeNode::truncated(view));
            }
            let Some(link) = svc.descriptor().child else {
                return BuildOutcome::Found(TreeNode::leaf(view));
            };

            let child_svc = self.registry.get(link.entity_type);
            let filter = Filter { parent_id: Some(id), ..access_filter(link.entity_type, opts) };
            let children = match child_svc.find_sorted(&filter).await {
                Ok(children) => children,
                Err(e) => return self.branch_error(entity_type, id, e),
            };

            let mut branches = Vec::with_capacity(children.len());
            for child in children {
                let outcome = self
                    .build_node(Arc::clone(&child_svc), child, child_series.clone(), opts, depth + 1)
                    .await;
                branches.extend(outcome.into_branch());
            }
            BuildOutcome::Found(TreeNode::with_children(view, link.field, branches))
        })
    }

    fn branch_error(&self, entity_type: EntityType, id: Uuid, err: ServiceError) -> BuildOutcome {
        BRANCH_ERRORS_TOTAL.inc();
        error!(%entity_type, %id, error = %err, "tree branch failed");
        BuildOutcome::Error(BranchError { id, entity_type, error: err.to_string() })
    }

    /// Every series with its subtree. Series are structural and never
    /// filtered by `isActive`.
    #[instrument(skip(self, opts), fields(max_depth = ?opts.max_depth, filter_active = opts.access_options.filter_active))]
    pub async fn get_full_hierarchy_data(&self, opts: &HierarchyOptions) -> Result<Vec<TreeBranch>, ServiceError> {
        let roots = self.registry.get(EntityType::Series);
        let series = roots.find_sorted(&Filter::default()).await?;
        let mut tree = Vec::with_capacity(series.len());
        for doc in series {
            let outcome = self.build_node(Arc::clone(&roots), doc, None, opts, 0).await;
            tree.extend(outcome.into_branch());
        }
        Ok(tree)
    }

    #[instrument(skip(self, opts))]
    pub async fn get_children_by_parent_id_data(
        &self,
        parent_type: EntityType,
        parent_id: Uuid,
        opts: &HierarchyOptions,
    ) -> Result<ChildrenData, ServiceError> {
        let parent_svc = self.registry.get(parent_type);
        let Some(child_type) = parent_svc.descriptor().child_type() else {
            return Err(ServiceError::BadRequest(format!("{parent_type} has no child type")));
        };
        let parent = parent_svc.ensure_exists(parent_id, None).await?;
        let child_svc = self.registry.get(child_type);
        let filter = Filter { parent_id: Some(parent_id), ..access_filter(child_type, opts) };
        let children = child_svc.find_sorted(&filter).await?;

        let language = opts.language.as_deref();
        let parent_series = parent_svc.resolve_series(&parent).await?;
        let child_series = if parent_svc.descriptor().is_root() { Some(SeriesRef::of(&parent)) } else { parent_series.clone() };
        let children = children
            .into_iter()
            .map(|doc| child_svc.format_with(doc, child_series.clone(), language))
            .collect();
        Ok(ChildrenData { children, child_type, parent: parent_svc.format_with(parent, parent_series, language) })
    }

    /// Walk parent references up to the root. The item itself honours access
    /// filtering. A dangling reference ends the walk and the partial chain is
    /// returned.
    #[instrument(skip(self, opts))]
    pub async fn get_parent_hierarchy_data(
        &self,
        item_type: EntityType,
        item_id: Uuid,
        opts: &HierarchyOptions,
    ) -> Result<ParentChain, ServiceError> {
        let item =
            self.registry.get(item_type).ensure_exists(item_id, Some(&access_filter(item_type, opts))).await?;
        let mut next = item.parent_id;
        let mut walked: Vec<(EntityType, Document)> = vec![(item_type, item)];
        let mut complete = true;

        let mut current = item_type;
        while let Some(parent_type) = current.descriptor().parent_type() {
            let Some(parent_id) = next else {
                warn!(%current, "parent reference missing, chain is partial");
                complete = false;
                break;
            };
            match self.registry.get(parent_type).collection().get(parent_id).await? {
                Some(parent) => {
                    next = parent.parent_id;
                    walked.push((parent_type, parent));
                    current = parent_type;
                }
                None => {
                    warn!(%parent_type, %parent_id, "parent not found, chain is partial");
                    complete = false;
                    break;
                }
            }
        }
        walked.reverse();

        let series = match walked.first() {
            Some((t, root)) if t.descriptor().is_root() => Some(SeriesRef::of(root)),
            _ => None,
        };
        let language = opts.language.as_deref();
        let chain = walked
            .into_iter()
            .map(|(t, doc)| {
                let series = if t.descriptor().is_root() { None } else { series.clone() };
                EntityView::from_document(t, doc, series, language)
            })
            .collect();
        Ok(ParentChain { chain, complete })
    }

    /// Tree below one item. The start node itself honours access filtering.
    #[instrument(skip(self, opts))]
    pub async fn get_sub_hierarchy_data(
        &self,
        item_type: EntityType,
        item_id: Uuid,
        opts: &HierarchyOptions,
    ) -> Result<TreeBranch, ServiceError> {
        self.registry.get(item_type).ensure_exists(item_id, Some(&access_filter(item_type, opts))).await?;
        self.build_hierarchy_tree(item_type, item_id, opts, 0)
            .await
            .into_branch()
            .ok_or_else(|| ServiceError::NotFound(format!("{item_type} {item_id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{input, memory_registry, seed, seed_chain};

    fn codes(branches: &[TreeBranch]) -> Vec<String> {
        branches.iter().filter_map(|b| b.as_node()?.entity.code.clone()).collect()
    }

    #[tokio::test]
    async fn full_tree_follows_the_chain() {
        let (_, registry) = memory_registry();
        let chain = seed_chain(&registry).await;
        let hierarchy = HierarchyService::new(Arc::clone(&registry));

        let tree = hierarchy.get_full_hierarchy_data(&HierarchyOptions::default()).await.unwrap();
        assert_eq!(tree.len(), 1);
        let series = tree[0].as_node().unwrap();
        let category = series.child_nodes().next().unwrap();
        let sub = category.child_nodes().next().unwrap();
        let spec = sub.child_nodes().next().unwrap();
        let product = spec.child_nodes().next().unwrap();
        assert_eq!(product.entity.id, chain.product.id);
        assert_eq!(product.entity.series.as_ref().map(|s| s.id), Some(chain.series.id));
        assert!(product.children.is_empty());
        assert!(series.children.contains_key("categories"));
    }

    #[tokio::test]
    async fn siblings_are_naturally_sorted() {
        let (_, registry) = memory_registry();
        let s = seed(&registry, EntityType::Series, "S1", None).await;
        for code in ["2A", "10", "1", "ITEM"] {
            seed(&registry, EntityType::Categories, code, Some(s.id)).await;
        }
        let hierarchy = HierarchyService::new(registry);
        let Some(TreeBranch::Node(node)) = hierarchy
            .build_hierarchy_tree(EntityType::Series, s.id, &HierarchyOptions::default(), 0)
            .await
            .into_branch()
        else {
            panic!("series should build");
        };
        assert_eq!(codes(node.branches()), ["1", "2A", "10", "ITEM"]);
    }

    #[tokio::test]
    async fn inactive_products_hidden_only_when_filtering() {
        let (_, registry) = memory_registry();
        let chain = seed_chain(&registry).await;
        registry
            .get(EntityType::Products)
            .update(chain.product.id, input(json!({"isActive": false})))
            .await
            .unwrap();
        // inactive catalog levels above products stay visible
        registry
            .get(EntityType::Categories)
            .update(chain.category.id, input(json!({"isActive": false})))
            .await
            .unwrap();
        let hierarchy = HierarchyService::new(registry);

        let filtered = hierarchy
            .get_sub_hierarchy_data(EntityType::Specifications, chain.specification.id, &HierarchyOptions::filtered(true))
            .await
            .unwrap();
        assert!(filtered.as_node().unwrap().branches().is_empty());

        let tree = hierarchy.get_full_hierarchy_data(&HierarchyOptions::filtered(true)).await.unwrap();
        let spec = tree[0]
            .as_node()
            .and_then(|s| s.child_nodes().next())
            .and_then(|c| c.child_nodes().next())
            .and_then(|sc| sc.child_nodes().next())
            .expect("ancestors intact");
        assert_eq!(spec.entity.id, chain.specification.id);
        assert!(spec.branches().is_empty());

        let unfiltered = hierarchy
            .get_sub_hierarchy_data(EntityType::Specifications, chain.specification.id, &HierarchyOptions::filtered(false))
            .await
            .unwrap();
        assert_eq!(codes(unfiltered.as_node().unwrap().branches()), ["P1"]);

        let err = hierarchy
            .get_sub_hierarchy_data(EntityType::Products, chain.product.id, &HierarchyOptions::filtered(true))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn zero_depth_returns_only_own_fields() {
        let (_, registry) = memory_registry();
        let chain = seed_chain(&registry).await;
        let hierarchy = HierarchyService::new(registry);
        let opts = HierarchyOptions::default().with_max_depth(0);
        match hierarchy.build_hierarchy_tree(EntityType::Series, chain.series.id, &opts, 0).await {
            BuildOutcome::Found(node) => {
                assert!(node.depth_truncated);
                assert!(node.children.is_empty());
                assert_eq!(node.entity.id, chain.series.id);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn depth_limit_truncates_below_limit() {
        let (_, registry) = memory_registry();
        let chain = seed_chain(&registry).await;
        let hierarchy = HierarchyService::new(registry);
        let opts = HierarchyOptions::default().with_max_depth(1);
        let BuildOutcome::Found(node) = hierarchy.build_hierarchy_tree(EntityType::Series, chain.series.id, &opts, 0).await
        else {
            panic!("series should build");
        };
        let category = node.child_nodes().next().unwrap();
        assert!(category.depth_truncated);
        assert!(category.children.is_empty());
    }

    #[tokio::test]
    async fn missing_root_is_pruned() {
        let (_, registry) = memory_registry();
        let hierarchy = HierarchyService::new(registry);
        let outcome = hierarchy
            .build_hierarchy_tree(EntityType::Series, Uuid::new_v4(), &HierarchyOptions::default(), 0)
            .await;
        assert_eq!(outcome, BuildOutcome::Pruned);
    }

    #[tokio::test]
    async fn failing_branch_becomes_marker() {
        let (store, registry) = memory_registry();
        let chain = seed_chain(&registry).await;
        let c2 = seed(&registry, EntityType::Categories, "C2", Some(chain.series.id)).await;
        store.fail_child_reads_of(chain.category.id);
        let hierarchy = HierarchyService::new(registry);

        let tree = hierarchy.get_full_hierarchy_data(&HierarchyOptions::default()).await.unwrap();
        let branches = tree[0].as_node().unwrap().branches();
        assert_eq!(branches.len(), 2);
        match &branches[0] {
            TreeBranch::Error(marker) => {
                assert_eq!(marker.id, chain.category.id);
                assert_eq!(marker.entity_type, EntityType::Categories);
            }
            other => panic!("expected marker, got {other:?}"),
        }
        assert_eq!(branches[1].as_node().map(|n| n.entity.id), Some(c2.id));
    }

    #[tokio::test]
    async fn parent_chain_runs_root_to_item() {
        let (_, registry) = memory_registry();
        let chain = seed_chain(&registry).await;
        let hierarchy = HierarchyService::new(registry);
        let walked = hierarchy
            .get_parent_hierarchy_data(EntityType::Products, chain.product.id, &HierarchyOptions::default())
            .await
            .unwrap();
        assert!(walked.complete);
        let ids: Vec<_> = walked.chain.iter().map(|v| v.id).collect();
        assert_eq!(
            ids,
            [chain.series.id, chain.category.id, chain.sub_category.id, chain.specification.id, chain.product.id]
        );
    }

    #[tokio::test]
    async fn parent_chain_stops_at_missing_ancestor() {
        let (store, registry) = memory_registry();
        let chain = seed_chain(&registry).await;
        store.remove_raw(chain.sub_category.id).await;
        let hierarchy = HierarchyService::new(registry);
        let walked = hierarchy
            .get_parent_hierarchy_data(EntityType::Products, chain.product.id, &HierarchyOptions::default())
            .await
            .unwrap();
        assert!(!walked.complete);
        let ids: Vec<_> = walked.chain.iter().map(|v| v.id).collect();
        assert_eq!(ids, [chain.specification.id, chain.product.id]);
    }

    #[tokio::test]
    async fn parent_chain_hides_inactive_item_when_filtering() {
        let (_, registry) = memory_registry();
        let chain = seed_chain(&registry).await;
        registry
            .get(EntityType::Products)
            .update(chain.product.id, input(json!({"isActive": false})))
            .await
            .unwrap();
        let hierarchy = HierarchyService::new(registry);

        let err = hierarchy
            .get_parent_hierarchy_data(EntityType::Products, chain.product.id, &HierarchyOptions::filtered(true))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let walked = hierarchy
            .get_parent_hierarchy_data(EntityType::Products, chain.product.id, &HierarchyOptions::filtered(false))
            .await
            .unwrap();
        assert_eq!(walked.chain.len(), 5);
        assert!(!walked.chain[4].is_active);
    }

    #[tokio::test]
    async fn children_listing_validates_parent() {
        let (_, registry) = memory_registry();
        let chain = seed_chain(&registry).await;
        seed(&registry, EntityType::Categories, "0C", Some(chain.series.id)).await;
        let hierarchy = HierarchyService::new(registry);
        let opts = HierarchyOptions { language: Some("en".into()), ..Default::default() };

        let data = hierarchy
            .get_children_by_parent_id_data(EntityType::Series, chain.series.id, &opts)
            .await
            .unwrap();
        assert_eq!(data.child_type, EntityType::Categories);
        assert_eq!(data.parent.id, chain.series.id);
        let codes: Vec<_> = data.children.iter().filter_map(|c| c.code.clone()).collect();
        assert_eq!(codes, ["0C", "C1"]);
        assert_eq!(data.children[1].display_name.as_deref(), Some("C1"));
        assert!(data.children.iter().all(|c| c.series.as_ref().map(|s| s.id) == Some(chain.series.id)));

        let err = hierarchy
            .get_children_by_parent_id_data(EntityType::Products, chain.product.id, &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));

        let err = hierarchy
            .get_children_by_parent_id_data(EntityType::Series, Uuid::new_v4(), &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
