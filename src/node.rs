//! Decoded FBX node forest.
//!
//! A parsed file is a tree of named nodes, each carrying an ordered list of
//! typed properties and an ordered list of children. Query helpers borrow
//! nodes and return `None` on any mismatch; callers decide whether absence
//! is an error.

/// A parsed FBX document: the format version and the top-level node forest,
/// held by a synthetic unnamed root node.
#[derive(Clone, Debug)]
pub struct Document {
    pub version: u32,
    pub root: Node,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<Node>,
}

/// A typed node property. Scalar and array variants mirror the one-byte
/// type tags of the container format.
#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    I16(i16),
    Bool(bool),
    I32(i32),
    F32(f32),
    F64(f64),
    I64(i64),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
    I64Array(Vec<i64>),
    I32Array(Vec<i32>),
    BoolArray(Vec<bool>),
    String(String),
    Raw(Vec<u8>),
}

impl Property {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Property::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::String(v) => Some(v),
            _ => None,
        }
    }

    /// Any numeric scalar as f64. The container stores nominally-double
    /// values with whichever scalar tag the exporter chose, so rest-pose
    /// components are read through this.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Property::I16(v) => Some(f64::from(*v)),
            Property::I32(v) => Some(f64::from(*v)),
            Property::I64(v) => Some(*v as f64),
            Property::F32(v) => Some(f64::from(*v)),
            Property::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64_array(&self) -> Option<&[i64]> {
        match self {
            Property::I64Array(v) => Some(v),
            p if p.is_empty_array() => Some(&[]),
            _ => None,
        }
    }

    pub fn as_f32_array(&self) -> Option<&[f32]> {
        match self {
            Property::F32Array(v) => Some(v),
            p if p.is_empty_array() => Some(&[]),
            _ => None,
        }
    }

    pub fn as_f64_array(&self) -> Option<&[f64]> {
        match self {
            Property::F64Array(v) => Some(v),
            p if p.is_empty_array() => Some(&[]),
            _ => None,
        }
    }

    // An empty array satisfies any array-typed accessor; the element type
    // of nothing is irrelevant.
    fn is_empty_array(&self) -> bool {
        match self {
            Property::F32Array(v) => v.is_empty(),
            Property::F64Array(v) => v.is_empty(),
            Property::I64Array(v) => v.is_empty(),
            Property::I32Array(v) => v.is_empty(),
            Property::BoolArray(v) => v.is_empty(),
            _ => false,
        }
    }
}

/// Expected value for a property-index predicate in [`Node::child_where`].
#[derive(Copy, Clone, Debug)]
pub enum PropMatch<'a> {
    Str(&'a str),
    I64(i64),
}

impl PropMatch<'_> {
    fn matches(&self, property: &Property) -> bool {
        match self {
            PropMatch::Str(expected) => property.as_str() == Some(expected),
            PropMatch::I64(expected) => property.as_i64() == Some(*expected),
        }
    }
}

impl Node {
    /// First child with the given tag, in declaration order.
    pub fn child(&self, tag: &str) -> Option<&Node> {
        self.children.iter().find(|n| n.name == tag)
    }

    /// All children with the given tag, in declaration order.
    pub fn children<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children.iter().filter(move |n| n.name == tag)
    }

    /// First child with the given tag whose properties at the given indices
    /// exactly equal the given values.
    pub fn child_where(&self, tag: &str, predicates: &[(usize, PropMatch<'_>)]) -> Option<&Node> {
        self.children
            .iter()
            .find(|n| n.name == tag && n.matches(predicates))
    }

    /// All children with the given tag that satisfy the predicates, in
    /// declaration order.
    pub fn children_where(
        &self,
        tag: &str,
        predicates: &[(usize, PropMatch<'_>)],
    ) -> Vec<&Node> {
        self.children
            .iter()
            .filter(|n| n.name == tag && n.matches(predicates))
            .collect()
    }

    fn matches(&self, predicates: &[(usize, PropMatch<'_>)]) -> bool {
        predicates.iter().all(|(index, expected)| {
            self.properties
                .get(*index)
                .is_some_and(|p| expected.matches(p))
        })
    }

    pub fn prop(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }

    pub fn prop_str(&self, index: usize) -> Option<&str> {
        self.prop(index)?.as_str()
    }

    pub fn prop_i64(&self, index: usize) -> Option<i64> {
        self.prop(index)?.as_i64()
    }

    pub fn prop_number(&self, index: usize) -> Option<f64> {
        self.prop(index)?.as_number()
    }

    pub fn prop_i64_array(&self, index: usize) -> Option<&[i64]> {
        self.prop(index)?.as_i64_array()
    }

    pub fn prop_f32_array(&self, index: usize) -> Option<&[f32]> {
        self.prop(index)?.as_f32_array()
    }

    pub fn prop_f64_array(&self, index: usize) -> Option<&[f64]> {
        self.prop(index)?.as_f64_array()
    }

    /// Looks up a named entry in this node's `Properties70` subtree: the
    /// `P` child whose first property equals `name`. Entry values start at
    /// property index 4.
    pub fn property70(&self, name: &str) -> Option<&Node> {
        self.child("Properties70")?
            .child_where("P", &[(0, PropMatch::Str(name))])
    }
}
