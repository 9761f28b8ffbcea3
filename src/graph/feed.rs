use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::db::{Database, NewNode};
use crate::error::{MetadataError, Result};
use crate::models::*;
use crate::schema::{decode_feed_format, DerivedSchema};

use super::connection::{is_referencing_datasource, DATASOURCE};
use super::sla::PRECONDITION_SLA;
use super::{
    referenced, referenced_set, resolve_category, Category, Datasource, Entity, FeedDestination,
    FeedPrecondition, FeedSource, FeedTemplate, SecurityGroup, ServiceLevelAgreement,
    DESCRIPTION, SYSTEM_NAME, TITLE,
};

pub const ALLOWED_ACTIONS: Property<String> = Property::new("tba:allowedActions");
pub const PRECONDITION: Reference = Reference::new("tba:precondition", NodeType::FeedPrecondition);
pub const DEPENDENTS: SetProperty = SetProperty::new("tba:dependentFeeds", NodeType::Feed);
pub const SOURCES: SetProperty = SetProperty::new("tba:sources", NodeType::FeedSource);
pub const DESTINATIONS: SetProperty =
    SetProperty::new("tba:destinations", NodeType::FeedDestination);
pub const CATEGORY: Reference = Reference::new("tba:category", NodeType::Category);
pub const STATE: Property<FeedState> = Property::new("tba:state");
pub const TEMPLATE: Reference = Reference::new("tba:template", NodeType::FeedTemplate);
/// Cron expression or timer expression, depending on [`SCHEDULE_STRATEGY`].
pub const SCHEDULE_PERIOD: Property<String> = Property::new("tba:schedulingPeriod");
pub const SCHEDULE_STRATEGY: Property<ScheduleStrategy> = Property::new("tba:schedulingStrategy");
pub const SLA: SetProperty = SetProperty::new("tba:slas", NodeType::Sla);
pub const SECURITY_GROUPS: SetProperty =
    SetProperty::new("tba:securityGroups", NodeType::SecurityGroup);

/// Property names of the derived table strings stored on a feed.
pub mod table {
    pub const PARTITION_STRUCTURE: &str = "tba:table.partitionStructure";
    pub const FIELD_STRUCTURE: &str = "tba:table.fieldStructure";
    pub const FIELDS_STRING: &str = "tba:table.fieldsString";
    pub const NULLABLE_FIELDS: &str = "tba:table.nullableFields";
    pub const PRIMARY_KEY_FIELDS: &str = "tba:table.primaryKeyFields";
    pub const SOURCE_FIELDS: &str = "tba:table.sourceFields";
    pub const FIELD_INDEX_STRING: &str = "tba:table.fieldIndexString";
    pub const PARTITION_SPECS: &str = "tba:table.partitionSpecs";
    pub const FIELD_POLICIES_JSON: &str = "tba:table.fieldPoliciesJson";
    pub const TARGET_TBL_PROPERTIES: &str = "tba:table.targetTblProperties";
    pub const FEED_FORMAT: &str = "tba:table.feedFormat";
}

/// A schedulable data pipeline.
///
/// A feed node lives under its category node and also references it
/// directly. Dependencies, SLAs and security groups are deduplicated set
/// properties on the feed; sources and destinations are child nodes listed in
/// ordered set properties.
#[derive(Clone)]
pub struct Feed {
    db: Database,
    node: Node,
}

impl Entity for Feed {
    const NODE_TYPE: NodeType = NodeType::Feed;

    fn from_node(db: &Database, node: Node) -> Self {
        Self {
            db: db.clone(),
            node,
        }
    }

    fn node(&self) -> &Node {
        &self.node
    }

    fn db(&self) -> &Database {
        &self.db
    }
}

impl std::fmt::Debug for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed").field("node", &self.node).finish()
    }
}

impl PartialEq for Feed {
    fn eq(&self, other: &Self) -> bool {
        self.node.id == other.node.id
    }
}

impl Feed {
    /// Provision a feed under `category`.
    pub fn create(db: &Database, category: &Category, input: CreateFeedInput) -> Result<Self> {
        let title = input.title.unwrap_or_else(|| input.system_name.clone());
        let state = input.state.unwrap_or_default();
        let node = db.create_node(
            NewNode::new(NodeType::Feed, Some(category.id()))
                .property(SYSTEM_NAME.name, input.system_name.clone())
                .property(TITLE.name, title)
                .optional_property(DESCRIPTION.name, input.description)
                .property(STATE.name, state.to_property())
                .optional_property(SCHEDULE_PERIOD.name, input.schedule_period)
                .optional_property(
                    SCHEDULE_STRATEGY.name,
                    input.schedule_strategy.map(|s| s.to_property()),
                )
                .reference(CATEGORY.name, category.id()),
        )?;

        tracing::info!(feed = %node.id, name = %input.system_name, "Created feed");
        Ok(Self::from_node(db, node))
    }

    /// The feed's system name, or an empty string for unnamed legacy nodes.
    pub fn name(&self) -> Result<String> {
        Ok(self.system_name()?.unwrap_or_default())
    }

    /// `<category>.<feed>`
    pub fn qualified_name(&self) -> Result<String> {
        Ok(format!("{}.{}", self.category()?.name()?, self.name()?))
    }

    pub fn display_name(&self) -> Result<Option<String>> {
        self.title()
    }

    pub fn set_display_name(&self, name: &str) -> Result<()> {
        self.set_title(name)
    }

    // ============================================================
    // Category and template
    // ============================================================

    /// The feed's category: the explicit reference if present, else the
    /// structural parent. Fails with `CategoryNotFound` if neither is a category.
    pub fn category(&self) -> Result<Category> {
        resolve_category(&self.db, &self.node)
    }

    pub fn template(&self) -> Result<Option<FeedTemplate>> {
        referenced(&self.db, self.node.id, TEMPLATE)
    }

    pub fn set_template(&self, template: Option<&FeedTemplate>) -> Result<()> {
        self.db
            .set_reference(self.node.id, TEMPLATE.name, template.map(|t| t.id()))
    }

    // ============================================================
    // State and scheduling
    // ============================================================

    pub fn state(&self) -> Result<FeedState> {
        Ok(self.db.get_typed(self.node.id, STATE)?.unwrap_or_default())
    }

    pub fn set_state(&self, state: FeedState) -> Result<()> {
        self.db.set_typed(self.node.id, STATE, Some(&state))
    }

    pub fn schedule_period(&self) -> Result<Option<String>> {
        self.db.get_typed(self.node.id, SCHEDULE_PERIOD)
    }

    pub fn set_schedule_period(&self, period: Option<&str>) -> Result<()> {
        self.db
            .set_property(self.node.id, SCHEDULE_PERIOD.name, period)
    }

    pub fn schedule_strategy(&self) -> Result<Option<ScheduleStrategy>> {
        self.db.get_typed(self.node.id, SCHEDULE_STRATEGY)
    }

    pub fn set_schedule_strategy(&self, strategy: Option<ScheduleStrategy>) -> Result<()> {
        self.db
            .set_typed(self.node.id, SCHEDULE_STRATEGY, strategy.as_ref())
    }

    // ============================================================
    // Sources and destinations
    // ============================================================

    pub fn sources(&self) -> Result<Vec<FeedSource>> {
        referenced_set(&self.db, self.node.id, SOURCES)
    }

    pub fn destinations(&self) -> Result<Vec<FeedDestination>> {
        referenced_set(&self.db, self.node.id, DESTINATIONS)
    }

    pub fn add_source(&self, datasource: &Datasource) -> Result<FeedSource> {
        let node = self.add_connection(NodeType::FeedSource, SOURCES, datasource)?;
        Ok(FeedSource::from_node(&self.db, node))
    }

    pub fn add_destination(&self, datasource: &Datasource) -> Result<FeedDestination> {
        let node = self.add_connection(NodeType::FeedDestination, DESTINATIONS, datasource)?;
        Ok(FeedDestination::from_node(&self.db, node))
    }

    fn add_connection(
        &self,
        node_type: NodeType,
        set: SetProperty,
        datasource: &Datasource,
    ) -> Result<Node> {
        let node = self.db.create_node(
            NewNode::new(node_type, Some(self.node.id)).reference(DATASOURCE.name, datasource.id()),
        )?;
        self.db.add_to_set_property(self.node.id, set.name, node.id)?;
        Ok(node)
    }

    /// The first source reading from `datasource_id`.
    pub fn source(&self, datasource_id: Uuid) -> Result<Option<FeedSource>> {
        for source in self.sources()? {
            if is_referencing_datasource(&self.db, source.id(), datasource_id)? {
                return Ok(Some(source));
            }
        }
        Ok(None)
    }

    /// The first destination writing to `datasource_id`.
    ///
    /// Each destination node is checked for the datasource reference, the
    /// same way [`Feed::source`] checks sources.
    pub fn destination(&self, datasource_id: Uuid) -> Result<Option<FeedDestination>> {
        for destination in self.destinations()? {
            if is_referencing_datasource(&self.db, destination.id(), datasource_id)? {
                return Ok(Some(destination));
            }
        }
        Ok(None)
    }

    // ============================================================
    // Precondition
    // ============================================================

    pub fn precondition(&self) -> Result<Option<FeedPrecondition>> {
        referenced(&self.db, self.node.id, PRECONDITION)
    }

    /// Gate the feed on `sla`, replacing any previous precondition.
    pub fn set_precondition(&self, sla: &ServiceLevelAgreement) -> Result<FeedPrecondition> {
        let node = self.db.replace_child_node(
            self.node.id,
            PRECONDITION.name,
            NewNode::new(NodeType::FeedPrecondition, Some(self.node.id))
                .reference(PRECONDITION_SLA.name, sla.id()),
        )?;
        Ok(FeedPrecondition::from_node(&self.db, node))
    }

    // ============================================================
    // Dependent feeds
    // ============================================================

    pub fn dependent_feeds(&self) -> Result<Vec<Feed>> {
        referenced_set(&self.db, self.node.id, DEPENDENTS)
    }

    /// Returns `true` if `feed` was not already a dependent.
    ///
    /// A feed cannot depend on itself; longer cycles are not checked.
    pub fn add_dependent_feed(&self, feed: &Feed) -> Result<bool> {
        if feed.id() == self.node.id {
            return Err(MetadataError::InvalidInput(format!(
                "Feed {} cannot depend on itself",
                self.node.id
            )));
        }
        self.db
            .add_to_set_property(self.node.id, DEPENDENTS.name, feed.id())
    }

    /// Returns `true` if `feed` was a dependent.
    pub fn remove_dependent_feed(&self, feed: &Feed) -> Result<bool> {
        self.db
            .remove_from_set_property(self.node.id, DEPENDENTS.name, feed.id())
    }

    // ============================================================
    // Service level agreements
    // ============================================================

    pub fn service_level_agreements(&self) -> Result<Vec<ServiceLevelAgreement>> {
        referenced_set(&self.db, self.node.id, SLA)
    }

    /// Returns `true` if the SLA was not already referenced.
    pub fn add_service_level_agreement(&self, sla: &ServiceLevelAgreement) -> Result<bool> {
        self.db.add_to_set_property(self.node.id, SLA.name, sla.id())
    }

    /// Drop the reference to the SLA whose id matches `id`, ignoring case.
    ///
    /// The set is read and rewritten without the matching member in one
    /// store transaction. Returns `true` if a member was removed; an unknown
    /// id leaves the set untouched.
    pub fn remove_service_level_agreement(&self, id: &str) -> Result<bool> {
        let id = id.trim();
        self.db
            .retain_set_property(self.node.id, SLA.name, |member| {
                !member.to_string().eq_ignore_ascii_case(id)
            })
            .map_err(|e| {
                self.repository_error(
                    format!(
                        "Unable to remove reference to SLA {} from feed {}",
                        id, self.node.id
                    ),
                    e,
                )
            })
    }

    /// Replace every SLA reference with `slas`.
    pub fn set_service_level_agreements(&self, slas: &[ServiceLevelAgreement]) -> Result<()> {
        let ids: Vec<Uuid> = slas.iter().map(|s| s.id()).collect();
        self.db
            .replace_set_property(self.node.id, SLA.name, &ids)
            .map_err(|e| {
                self.repository_error(format!("Unable to set SLAs on feed {}", self.node.id), e)
            })
    }

    // ============================================================
    // Security groups
    // ============================================================

    pub fn security_groups(&self) -> Result<Vec<SecurityGroup>> {
        referenced_set(&self.db, self.node.id, SECURITY_GROUPS)
    }

    /// Replace every security group reference with `groups`. An empty slice
    /// detaches all groups.
    pub fn set_security_groups(&self, groups: &[SecurityGroup]) -> Result<()> {
        let ids: Vec<Uuid> = groups.iter().map(|g| g.id()).collect();
        self.db
            .replace_set_property(self.node.id, SECURITY_GROUPS.name, &ids)
            .map_err(|e| {
                self.repository_error(
                    format!("Unable to set security groups on feed {}", self.node.id),
                    e,
                )
            })
    }

    // ============================================================
    // User properties and access
    // ============================================================

    pub fn user_properties(&self) -> Result<BTreeMap<String, String>> {
        self.db.get_user_properties(self.node.id)
    }

    /// Replace the feed's user properties.
    ///
    /// `user_fields` describes the expected properties but is not enforced
    /// here; see [`UserFieldDescriptor::validate`].
    pub fn set_user_properties(
        &self,
        properties: &BTreeMap<String, String>,
        user_fields: &BTreeSet<UserFieldDescriptor>,
    ) -> Result<()> {
        let undescribed = properties
            .keys()
            .filter(|name| !user_fields.iter().any(|f| &f.system_name == *name))
            .count();
        if undescribed > 0 {
            tracing::debug!(feed = %self.node.id, undescribed, "Storing user properties without descriptors");
        }
        self.db.set_user_properties(self.node.id, properties)
    }

    /// Opaque reference to the feed's allowed-actions record.
    pub fn allowed_actions(&self) -> Result<Option<String>> {
        self.db.get_typed(self.node.id, ALLOWED_ACTIONS)
    }

    pub fn set_allowed_actions(&self, reference: Option<&str>) -> Result<()> {
        self.db
            .set_property(self.node.id, ALLOWED_ACTIONS.name, reference)
    }

    // ============================================================
    // Derived table metadata
    // ============================================================

    /// Persist derived table strings as scalar properties of the feed.
    pub fn store_derived_schema(&self, derived: &DerivedSchema) -> Result<()> {
        self.db.set_properties(
            self.node.id,
            &[
                (table::PARTITION_STRUCTURE, Some(derived.partition_structure.as_str())),
                (table::FIELD_STRUCTURE, Some(derived.field_structure.as_str())),
                (table::FIELDS_STRING, Some(derived.fields_string.as_str())),
                (table::NULLABLE_FIELDS, Some(derived.nullable_fields.as_str())),
                (table::PRIMARY_KEY_FIELDS, Some(derived.primary_key_fields.as_str())),
                (table::SOURCE_FIELDS, Some(derived.source_fields.as_str())),
                (table::FIELD_INDEX_STRING, Some(derived.field_index_string.as_str())),
                (table::PARTITION_SPECS, Some(derived.partition_specs.as_str())),
                (table::FIELD_POLICIES_JSON, Some(derived.field_policies_json.as_str())),
                (table::TARGET_TBL_PROPERTIES, Some(derived.target_tbl_properties.as_str())),
                (table::FEED_FORMAT, derived.feed_format.as_deref()),
            ],
        )
    }

    /// The derived table strings last stored on this feed, if any.
    pub fn derived_schema(&self) -> Result<Option<DerivedSchema>> {
        let Some(field_policies_json) = self.table_property(table::FIELD_POLICIES_JSON)? else {
            return Ok(None);
        };
        let text = |name: &str| -> Result<String> { Ok(self.table_property(name)?.unwrap_or_default()) };

        Ok(Some(DerivedSchema {
            partition_structure: text(table::PARTITION_STRUCTURE)?,
            field_structure: text(table::FIELD_STRUCTURE)?,
            fields_string: text(table::FIELDS_STRING)?,
            nullable_fields: text(table::NULLABLE_FIELDS)?,
            primary_key_fields: text(table::PRIMARY_KEY_FIELDS)?,
            source_fields: text(table::SOURCE_FIELDS)?,
            field_index_string: text(table::FIELD_INDEX_STRING)?,
            partition_specs: text(table::PARTITION_SPECS)?,
            field_policies_json,
            target_tbl_properties: text(table::TARGET_TBL_PROPERTIES)?,
            feed_format: self.table_property(table::FEED_FORMAT)?,
        }))
    }

    /// The stored row format, decoded.
    pub fn feed_format(&self) -> Result<Option<String>> {
        Ok(self
            .table_property(table::FEED_FORMAT)?
            .map(|stored| decode_feed_format(&stored)))
    }

    fn table_property(&self, name: &str) -> Result<Option<String>> {
        self.db.get_property(self.node.id, name)
    }

    fn repository_error(&self, message: String, error: MetadataError) -> MetadataError {
        match error {
            MetadataError::Store(source) => MetadataError::repository(message, source),
            other => other,
        }
    }
}
