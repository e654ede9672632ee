//! Filters - typed conditions that gate edges.
//!
//! A [`FilterEntry`] is one comparison of one [`FilterKind`]. Entries are
//! grouped into a [`FilterGroup`], which matches when every entry does. There
//! is no disjunction inside a group: alternatives are authored as separate
//! edges.
//!
//! Evaluation is total. Operands that cannot be resolved take their type's
//! zero-value, so a filter over keys that were never written still yields a
//! boolean.

mod ops;

pub use ops::*;

use encounter_state::{EnumCode, ScopeStore, Value, ValueType};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::address::{Address, LocalChain, LocalContext, LocalFields};

/// Host queries used by the inventory, module and interaction filters.
///
/// Every method defaults to "nothing there", so hosts only implement what
/// their graphs use.
pub trait WorldView {
    /// How many of an item the player holds.
    fn item_count(&self, _item: &str) -> i64 {
        0
    }

    /// Whether the player holds any item carrying the tag.
    fn has_tagged_item(&self, _tag: &str) -> bool {
        false
    }

    /// Whether an installed module has the trait.
    fn module_has_trait(&self, _module: &str, _trait_id: &str) -> bool {
        false
    }

    /// How many times the player has interacted with an encounter.
    fn interaction_count(&self, _encounter: &str) -> i64 {
        0
    }
}

/// A world with no inventory, modules or interaction history.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWorld;

impl WorldView for NullWorld {}

/// Everything a filter reads while being evaluated.
#[derive(Clone, Copy)]
pub struct FilterContext<'a> {
    pub store: &'a ScopeStore,
    pub world: &'a dyn WorldView,
    /// Tolerance of float equality.
    pub epsilon: f64,
}

impl<'a> FilterContext<'a> {
    pub fn new(store: &'a ScopeStore, world: &'a dyn WorldView, epsilon: f64) -> Self {
        Self {
            store,
            world,
            epsilon,
        }
    }
}

/// The closed set of filter kinds, each with its operation and operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FilterKind {
    BoolKv {
        op: BoolOp,
        lhs: Address<bool>,
        rhs: Address<bool>,
    },
    IntKv {
        op: IntOp,
        lhs: Address<i64>,
        rhs: Address<i64>,
    },
    FloatKv {
        op: FloatOp,
        lhs: Address<f64>,
        rhs: Address<f64>,
    },
    StringKv {
        op: StringOp,
        lhs: Address<String>,
        rhs: Address<String>,
    },
    EnumKv {
        /// Enumeration both operands belong to.
        enum_type: String,
        op: EnumOp,
        lhs: Address<EnumCode>,
        rhs: Address<EnumCode>,
    },
    /// Compares the held count of an item.
    InventoryId {
        item: Address<String>,
        op: IntOp,
        count: Address<i64>,
    },
    InventoryTag {
        tag: Address<String>,
        op: PresenceOp,
    },
    ModuleTrait {
        module: Address<String>,
        trait_id: Address<String>,
        op: PresenceOp,
    },
    /// Compares how often an encounter was interacted with.
    EncounterInteraction {
        encounter: Address<String>,
        op: IntOp,
        count: Address<i64>,
    },
}

impl FilterKind {
    /// Local operands with the type each one must have.
    fn local_operands(&self) -> Vec<(&str, ValueType)> {
        fn add<'a>(
            locals: &mut Vec<(&'a str, ValueType)>,
            name: Option<&'a str>,
            value_type: ValueType,
        ) {
            if let Some(name) = name {
                locals.push((name, value_type));
            }
        }

        let mut locals = Vec::new();
        match self {
            FilterKind::BoolKv { lhs, rhs, .. } => {
                add(&mut locals, lhs.local_name(), ValueType::Bool);
                add(&mut locals, rhs.local_name(), ValueType::Bool);
            }
            FilterKind::IntKv { lhs, rhs, .. } => {
                add(&mut locals, lhs.local_name(), ValueType::Int);
                add(&mut locals, rhs.local_name(), ValueType::Int);
            }
            FilterKind::FloatKv { lhs, rhs, .. } => {
                add(&mut locals, lhs.local_name(), ValueType::Float);
                add(&mut locals, rhs.local_name(), ValueType::Float);
            }
            FilterKind::StringKv { lhs, rhs, .. } => {
                add(&mut locals, lhs.local_name(), ValueType::Str);
                add(&mut locals, rhs.local_name(), ValueType::Str);
            }
            FilterKind::EnumKv {
                enum_type, lhs, rhs, ..
            } => {
                add(&mut locals, lhs.local_name(), ValueType::Enum(enum_type.clone()));
                add(&mut locals, rhs.local_name(), ValueType::Enum(enum_type.clone()));
            }
            FilterKind::InventoryId { item, count, .. } => {
                add(&mut locals, item.local_name(), ValueType::Str);
                add(&mut locals, count.local_name(), ValueType::Int);
            }
            FilterKind::InventoryTag { tag, .. } => {
                add(&mut locals, tag.local_name(), ValueType::Str);
            }
            FilterKind::ModuleTrait {
                module, trait_id, ..
            } => {
                add(&mut locals, module.local_name(), ValueType::Str);
                add(&mut locals, trait_id.local_name(), ValueType::Str);
            }
            FilterKind::EncounterInteraction {
                encounter, count, ..
            } => {
                add(&mut locals, encounter.local_name(), ValueType::Str);
                add(&mut locals, count.local_name(), ValueType::Int);
            }
        }

        locals
    }
}

/// An operand whose type does not match its filter.
#[derive(Debug, Clone, PartialEq)]
pub struct OperandMismatch {
    pub operand: String,
    pub expected: ValueType,
    /// `None` when a local operand names no field at all.
    pub found: Option<ValueType>,
}

/// One typed condition plus the local fields its operands may refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterEntry {
    pub kind: FilterKind,
    #[serde(default)]
    pub fields: LocalFields,
}

impl FilterEntry {
    /// Create an entry with no local fields.
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            fields: LocalFields::new(),
        }
    }

    pub fn bool_kv(op: BoolOp, lhs: Address<bool>, rhs: Address<bool>) -> Self {
        Self::new(FilterKind::BoolKv { op, lhs, rhs })
    }

    pub fn int_kv(op: IntOp, lhs: Address<i64>, rhs: Address<i64>) -> Self {
        Self::new(FilterKind::IntKv { op, lhs, rhs })
    }

    pub fn float_kv(op: FloatOp, lhs: Address<f64>, rhs: Address<f64>) -> Self {
        Self::new(FilterKind::FloatKv { op, lhs, rhs })
    }

    pub fn string_kv(op: StringOp, lhs: Address<String>, rhs: Address<String>) -> Self {
        Self::new(FilterKind::StringKv { op, lhs, rhs })
    }

    pub fn enum_kv(
        enum_type: impl Into<String>,
        op: EnumOp,
        lhs: Address<EnumCode>,
        rhs: Address<EnumCode>,
    ) -> Self {
        Self::new(FilterKind::EnumKv {
            enum_type: enum_type.into(),
            op,
            lhs,
            rhs,
        })
    }

    /// Add a local field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Check operand types against the entry's declared value types.
    ///
    /// `edge` supplies the locals of the edge the entry is attached to.
    pub fn validate(&self, edge: &dyn LocalContext) -> Result<(), OperandMismatch> {
        let chain = LocalChain {
            entry: &self.fields,
            edge,
        };

        for (name, expected) in self.kind.local_operands() {
            let found = chain.local(name).map(|value| value.value_type());
            if found.as_ref() != Some(&expected) {
                return Err(OperandMismatch {
                    operand: name.to_string(),
                    expected,
                    found,
                });
            }
        }

        if let FilterKind::EnumKv {
            enum_type, lhs, rhs, ..
        } = &self.kind
        {
            for (operand, address) in [("lhs", lhs), ("rhs", rhs)] {
                if let Address::Constant(code) = address {
                    if code.enum_type != *enum_type {
                        return Err(OperandMismatch {
                            operand: operand.to_string(),
                            expected: ValueType::Enum(enum_type.clone()),
                            found: Some(ValueType::Enum(code.enum_type.clone())),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Evaluate the entry.
    pub fn evaluate(&self, ctx: &FilterContext<'_>, edge: &dyn LocalContext) -> bool {
        let locals = LocalChain {
            entry: &self.fields,
            edge,
        };
        let store = ctx.store;

        let result = match &self.kind {
            FilterKind::BoolKv { op, lhs, rhs } => {
                op.apply(lhs.resolve(&locals, store), rhs.resolve(&locals, store))
            }
            FilterKind::IntKv { op, lhs, rhs } => {
                op.apply(lhs.resolve(&locals, store), rhs.resolve(&locals, store))
            }
            FilterKind::FloatKv { op, lhs, rhs } => op.apply(
                lhs.resolve(&locals, store),
                rhs.resolve(&locals, store),
                ctx.epsilon,
            ),
            FilterKind::StringKv { op, lhs, rhs } => {
                op.apply(&lhs.resolve(&locals, store), &rhs.resolve(&locals, store))
            }
            FilterKind::EnumKv {
                enum_type,
                op,
                lhs,
                rhs,
            } => {
                let lhs = conform(lhs.resolve(&locals, store), enum_type);
                let rhs = conform(rhs.resolve(&locals, store), enum_type);
                op.apply(&lhs, &rhs)
            }
            FilterKind::InventoryId { item, op, count } => {
                let held = ctx.world.item_count(&item.resolve(&locals, store));
                op.apply(held, count.resolve(&locals, store))
            }
            FilterKind::InventoryTag { tag, op } => {
                op.apply(ctx.world.has_tagged_item(&tag.resolve(&locals, store)))
            }
            FilterKind::ModuleTrait {
                module,
                trait_id,
                op,
            } => op.apply(ctx.world.module_has_trait(
                &module.resolve(&locals, store),
                &trait_id.resolve(&locals, store),
            )),
            FilterKind::EncounterInteraction {
                encounter,
                op,
                count,
            } => {
                let seen = ctx
                    .world
                    .interaction_count(&encounter.resolve(&locals, store));
                op.apply(seen, count.resolve(&locals, store))
            }
        };

        trace!(kind = ?self.kind, result, "filter evaluated");
        result
    }
}

/// Codes of another enumeration read as the zero code of the expected one.
fn conform(code: EnumCode, enum_type: &str) -> EnumCode {
    if code.enum_type == enum_type {
        code
    } else {
        EnumCode::zero(enum_type)
    }
}

/// An AND-combined list of filter entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterGroup {
    entries: Vec<FilterEntry>,
}

impl FilterGroup {
    /// Create an empty group, which always matches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to the group.
    pub fn with(mut self, entry: FilterEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn push(&mut self, entry: FilterEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when every entry is true, stopping at the first false one.
    pub fn evaluate(&self, ctx: &FilterContext<'_>, edge: &dyn LocalContext) -> bool {
        self.entries.iter().all(|entry| entry.evaluate(ctx, edge))
    }

    /// Validate every entry against the owning edge's locals.
    pub fn validate(&self, edge: &dyn LocalContext) -> Result<(), OperandMismatch> {
        self.entries.iter().try_for_each(|entry| entry.validate(edge))
    }
}

impl FromIterator<FilterEntry> for FilterGroup {
    fn from_iter<I: IntoIterator<Item = FilterEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::NoLocals;
    use encounter_state::ScopeKind;
    use std::cell::Cell;

    const EPSILON: f64 = 1e-6;

    fn probe_filter() -> FilterEntry {
        FilterEntry::int_kv(
            IntOp::Greater,
            Address::foreign(ScopeKind::Game, "surface_probe_count"),
            Address::constant(0),
        )
    }

    fn game_store() -> ScopeStore {
        let mut store = ScopeStore::new();
        store.begin_session();
        store
    }

    #[test]
    fn test_surface_probe_scenario() {
        let mut store = game_store();
        store.set(ScopeKind::Game, "surface_probe_count", 2i64).unwrap();

        let filter = probe_filter();
        let ctx = FilterContext::new(&store, &NullWorld, EPSILON);
        assert!(filter.evaluate(&ctx, &NoLocals));

        store.set(ScopeKind::Game, "surface_probe_count", 0i64).unwrap();
        let ctx = FilterContext::new(&store, &NullWorld, EPSILON);
        assert!(!filter.evaluate(&ctx, &NoLocals));
    }

    #[test]
    fn test_missing_key_uses_default() {
        let store = game_store();
        let ctx = FilterContext::new(&store, &NullWorld, EPSILON);

        assert!(!probe_filter().evaluate(&ctx, &NoLocals));

        let unset_flag = FilterEntry::bool_kv(
            BoolOp::Equal,
            Address::foreign(ScopeKind::Encounter, "door_open"),
            Address::constant(false),
        );
        assert!(unset_flag.evaluate(&ctx, &NoLocals));
    }

    #[test]
    fn test_float_filter_epsilon() {
        let mut store = game_store();
        store.set(ScopeKind::Game, "oxygen", 0.5f64).unwrap();

        let filter = FilterEntry::float_kv(
            FloatOp::Equal,
            Address::foreign(ScopeKind::Game, "oxygen"),
            Address::constant(0.5 + EPSILON / 2.0),
        );
        let ctx = FilterContext::new(&store, &NullWorld, EPSILON);
        assert!(filter.evaluate(&ctx, &NoLocals));

        let far = FilterEntry::float_kv(
            FloatOp::Equal,
            Address::foreign(ScopeKind::Game, "oxygen"),
            Address::constant(0.5 + EPSILON * 2.0),
        );
        assert!(!far.evaluate(&ctx, &NoLocals));
    }

    #[test]
    fn test_string_filter_with_local_operand() {
        let mut store = game_store();
        store.set(ScopeKind::Game, "planet", "Kepler Ice Moon").unwrap();

        let filter = FilterEntry::string_kv(
            StringOp::Contains,
            Address::foreign(ScopeKind::Game, "planet"),
            Address::local("needle"),
        )
        .with_field("needle", "Ice");

        let ctx = FilterContext::new(&store, &NullWorld, EPSILON);
        assert!(filter.evaluate(&ctx, &NoLocals));
    }

    #[test]
    fn test_enum_filter_ignores_foreign_identity() {
        let mut store = game_store();
        store
            .set(ScopeKind::Game, "hazards", EnumCode::new("Hazard", 0b011))
            .unwrap();
        store
            .set(ScopeKind::Game, "mood", EnumCode::new("Mood", 0b011))
            .unwrap();
        let ctx = FilterContext::new(&store, &NullWorld, EPSILON);

        let has_radiation = FilterEntry::enum_kv(
            "Hazard",
            EnumOp::HasFlag,
            Address::foreign(ScopeKind::Game, "hazards"),
            Address::constant(EnumCode::new("Hazard", 0b010)),
        );
        assert!(has_radiation.evaluate(&ctx, &NoLocals));

        // A code of another enumeration reads as zero.
        let wrong_enum = FilterEntry::enum_kv(
            "Hazard",
            EnumOp::HasFlag,
            Address::foreign(ScopeKind::Game, "mood"),
            Address::constant(EnumCode::new("Hazard", 0b010)),
        );
        assert!(!wrong_enum.evaluate(&ctx, &NoLocals));
    }

    struct Outpost;

    impl WorldView for Outpost {
        fn item_count(&self, item: &str) -> i64 {
            if item == "fuel_cell" {
                3
            } else {
                0
            }
        }

        fn has_tagged_item(&self, tag: &str) -> bool {
            tag == "medical"
        }

        fn module_has_trait(&self, module: &str, trait_id: &str) -> bool {
            module == "drill" && trait_id == "reinforced"
        }

        fn interaction_count(&self, encounter: &str) -> i64 {
            if encounter == "derelict" {
                1
            } else {
                0
            }
        }
    }

    #[test]
    fn test_world_filters() {
        let store = ScopeStore::new();
        let ctx = FilterContext::new(&store, &Outpost, EPSILON);

        let fuel = FilterEntry::new(FilterKind::InventoryId {
            item: Address::constant("fuel_cell"),
            op: IntOp::GreaterOrEqual,
            count: Address::constant(2),
        });
        assert!(fuel.evaluate(&ctx, &NoLocals));

        let no_weapons = FilterEntry::new(FilterKind::InventoryTag {
            tag: Address::constant("weapon"),
            op: PresenceOp::Lacks,
        });
        assert!(no_weapons.evaluate(&ctx, &NoLocals));

        let drill = FilterEntry::new(FilterKind::ModuleTrait {
            module: Address::constant("drill"),
            trait_id: Address::constant("reinforced"),
            op: PresenceOp::Has,
        });
        assert!(drill.evaluate(&ctx, &NoLocals));

        let first_visit = FilterEntry::new(FilterKind::EncounterInteraction {
            encounter: Address::constant("derelict"),
            op: IntOp::Equal,
            count: Address::constant(0),
        });
        assert!(!first_visit.evaluate(&ctx, &NoLocals));

        let null_ctx = FilterContext::new(&store, &NullWorld, EPSILON);
        assert!(!fuel.evaluate(&null_ctx, &NoLocals));
    }

    #[test]
    fn test_empty_group_matches() {
        let store = ScopeStore::new();
        let ctx = FilterContext::new(&store, &NullWorld, EPSILON);
        assert!(FilterGroup::new().evaluate(&ctx, &NoLocals));
    }

    #[test]
    fn test_group_is_conjunction() {
        let mut store = game_store();
        store.set(ScopeKind::Game, "surface_probe_count", 2i64).unwrap();
        store.set(ScopeKind::Game, "landed", false).unwrap();
        let ctx = FilterContext::new(&store, &NullWorld, EPSILON);

        let landed = FilterEntry::bool_kv(
            BoolOp::Equal,
            Address::foreign(ScopeKind::Game, "landed"),
            Address::constant(true),
        );

        let both_true = FilterGroup::new().with(probe_filter());
        let one_false = FilterGroup::new().with(probe_filter()).with(landed.clone());

        assert!(both_true.evaluate(&ctx, &NoLocals));
        assert!(!one_false.evaluate(&ctx, &NoLocals));
        assert!(!FilterGroup::new().with(landed).evaluate(&ctx, &NoLocals));
    }

    struct CountingLocals {
        reads: Cell<usize>,
    }

    impl LocalContext for CountingLocals {
        fn local(&self, _name: &str) -> Option<Value> {
            self.reads.set(self.reads.get() + 1);
            Some(Value::Int(0))
        }
    }

    #[test]
    fn test_group_short_circuits() {
        let store = ScopeStore::new();
        let ctx = FilterContext::new(&store, &NullWorld, EPSILON);
        let counter = CountingLocals {
            reads: Cell::new(0),
        };

        let always_false =
            FilterEntry::int_kv(IntOp::Equal, Address::constant(1), Address::constant(2));
        let reads_local =
            FilterEntry::int_kv(IntOp::Equal, Address::local("x"), Address::constant(0));

        let group: FilterGroup = [always_false, reads_local].into_iter().collect();
        assert!(!group.evaluate(&ctx, &counter));
        assert_eq!(counter.reads.get(), 0);
    }

    #[test]
    fn test_validate_local_operands() {
        let ok = FilterEntry::int_kv(IntOp::Less, Address::local("limit"), Address::constant(5))
            .with_field("limit", 3i64);
        assert!(ok.validate(&NoLocals).is_ok());

        let wrong_type =
            FilterEntry::int_kv(IntOp::Less, Address::local("limit"), Address::constant(5))
                .with_field("limit", "three");
        assert_eq!(
            wrong_type.validate(&NoLocals),
            Err(OperandMismatch {
                operand: "limit".into(),
                expected: ValueType::Int,
                found: Some(ValueType::Str),
            })
        );

        let missing =
            FilterEntry::float_kv(FloatOp::Less, Address::local("weight"), Address::constant(1.0));
        assert!(missing.validate(&NoLocals).is_err());

        let mut edge = LocalFields::new();
        edge.insert("weight".into(), Value::Float(0.5));
        assert!(missing.validate(&edge).is_ok());
    }

    #[test]
    fn test_validate_enum_constant_identity() {
        let mismatched = FilterEntry::enum_kv(
            "Hazard",
            EnumOp::Equal,
            Address::foreign(ScopeKind::Game, "hazards"),
            Address::constant(EnumCode::new("Mood", 1)),
        );
        let err = mismatched.validate(&NoLocals).unwrap_err();
        assert_eq!(err.operand, "rhs");
        assert_eq!(err.expected, ValueType::Enum("Hazard".into()));
    }

    #[test]
    fn test_filter_deserializes() {
        let json = r#"{
            "kind": {
                "kind": "IntKv",
                "op": "Greater",
                "lhs": { "Foreign": { "scope": "Game", "key": "surface_probe_count" } },
                "rhs": { "Constant": 0 }
            }
        }"#;
        let entry: FilterEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry, probe_filter());
    }
}
