//! Static declaration of the entity types and the catalog chain.
//!
//! series → categories → subCategories → specifications → products, plus the
//! flat content types which have neither parent nor child.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    Series,
    Categories,
    SubCategories,
    Specifications,
    Products,
    News,
    Faqs,
    CaseStudies,
}

impl EntityType {
    pub const ALL: [EntityType; 8] = [
        EntityType::Series,
        EntityType::Categories,
        EntityType::SubCategories,
        EntityType::Specifications,
        EntityType::Products,
        EntityType::News,
        EntityType::Faqs,
        EntityType::CaseStudies,
    ];

    /// Catalog chain, root first.
    pub const CHAIN: [EntityType; 5] = [
        EntityType::Series,
        EntityType::Categories,
        EntityType::SubCategories,
        EntityType::Specifications,
        EntityType::Products,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Series => "series",
            EntityType::Categories => "categories",
            EntityType::SubCategories => "subCategories",
            EntityType::Specifications => "specifications",
            EntityType::Products => "products",
            EntityType::News => "news",
            EntityType::Faqs => "faqs",
            EntityType::CaseStudies => "caseStudies",
        }
    }

    pub fn descriptor(self) -> &'static EntityDescriptor {
        &DESCRIPTORS[self as usize]
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ServiceError::BadRequest(format!("unknown entity type: {s}")))
    }
}

/// One side of a parent/child edge: the field name used on the wire and the
/// type it points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link {
    pub field: &'static str,
    pub entity_type: EntityType,
}

#[derive(Debug, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub entity_type: EntityType,
    pub parent: Option<Link>,
    pub child: Option<Link>,
    /// Content types opt out and may be stored without a code.
    pub requires_code: bool,
    /// Catalog entities are visible on creation, content must be published.
    pub default_active: bool,
    /// Whether the type carries a localized `name` map.
    pub localized_name: bool,
}

const fn catalog(entity_type: EntityType, parent: Option<Link>, child: Option<Link>) -> EntityDescriptor {
    EntityDescriptor { entity_type, parent, child, requires_code: true, default_active: true, localized_name: true }
}

const fn content(entity_type: EntityType) -> EntityDescriptor {
    EntityDescriptor { entity_type, parent: None, child: None, requires_code: false, default_active: false, localized_name: false }
}

const fn link(field: &'static str, entity_type: EntityType) -> Option<Link> {
    Some(Link { field, entity_type })
}

// Indexed by `EntityType as usize`; keep in declaration order.
static DESCRIPTORS: [EntityDescriptor; 8] = [
    catalog(EntityType::Series, None, link("categories", EntityType::Categories)),
    catalog(EntityType::Categories, link("series", EntityType::Series), link("subCategories", EntityType::SubCategories)),
    catalog(EntityType::SubCategories, link("category", EntityType::Categories), link("specifications", EntityType::Specifications)),
    catalog(EntityType::Specifications, link("subCategory", EntityType::SubCategories), link("products", EntityType::Products)),
    catalog(EntityType::Products, link("specification", EntityType::Specifications), None),
    content(EntityType::News),
    content(EntityType::Faqs),
    content(EntityType::CaseStudies),
];

impl EntityDescriptor {
    pub fn parent_field(&self) -> Option<&'static str> { self.parent.map(|l| l.field) }

    pub fn child_field(&self) -> Option<&'static str> { self.child.map(|l| l.field) }

    pub fn parent_type(&self) -> Option<EntityType> { self.parent.map(|l| l.entity_type) }

    pub fn child_type(&self) -> Option<EntityType> { self.child.map(|l| l.entity_type) }

    pub fn is_catalog(&self) -> bool { self.localized_name }

    pub fn is_root(&self) -> bool { self.is_catalog() && self.parent.is_none() }

    /// Types without children hold the publishable content; access filtering
    /// applies only to them.
    pub fn filters_inactive(&self) -> bool { self.child.is_none() }

    /// Ancestor types from the direct parent up to the root.
    pub fn ancestor_path(&self) -> Vec<EntityType> {
        let mut path = Vec::new();
        let mut next = self.parent_type();
        while let Some(t) = next {
            path.push(t);
            next = t.descriptor().parent_type();
        }
        path
    }

    /// Wire keys the engine owns; they never land in the free-form `data`.
    pub fn reserved_fields(&self) -> Vec<&'static str> {
        let mut keys = vec![
            "id",
            "entityType",
            "collection",
            "version",
            "createdAt",
            "updatedAt",
            "series",
            "displayName",
            "depthTruncated",
        ];
        keys.extend(self.parent_field());
        keys.extend(self.child_field());
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_are_indexed_by_type() {
        for t in EntityType::ALL {
            assert_eq!(t.descriptor().entity_type, t);
        }
    }

    #[test]
    fn chain_links_are_symmetric() {
        for pair in EntityType::CHAIN.windows(2) {
            let (parent, child) = (pair[0].descriptor(), pair[1].descriptor());
            assert_eq!(parent.child_type(), Some(child.entity_type));
            assert_eq!(child.parent_type(), Some(parent.entity_type));
        }
        assert!(EntityType::Series.descriptor().is_root());
        assert!(EntityType::Products.descriptor().child.is_none());
    }

    #[test]
    fn ancestor_path_walks_to_series() {
        assert_eq!(
            EntityType::Products.descriptor().ancestor_path(),
            vec![EntityType::Specifications, EntityType::SubCategories, EntityType::Categories, EntityType::Series]
        );
        assert!(EntityType::Series.descriptor().ancestor_path().is_empty());
        assert!(EntityType::News.descriptor().ancestor_path().is_empty());
    }

    #[test]
    fn content_types_opt_out_of_code_and_visibility() {
        let news = EntityType::News.descriptor();
        assert!(!news.requires_code);
        assert!(!news.default_active);
        assert!(!news.is_catalog());
    }

    #[test]
    fn parses_type_names() {
        assert_eq!("subCategories".parse::<EntityType>().unwrap(), EntityType::SubCategories);
        assert_eq!("PRODUCTS".parse::<EntityType>().unwrap(), EntityType::Products);
        assert!(matches!("widgets".parse::<EntityType>(), Err(ServiceError::BadRequest(_))));
    }
}
