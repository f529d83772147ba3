use crate::engine::{
    RawHandle, RawNode, TAG_ALGEBRAIC, TAG_BOOL, TAG_BV, TAG_FUNCTION, TAG_MAPPING,
    TAG_RATIONAL, TAG_SCALAR, TAG_TUPLE, TAG_UNKNOWN,
};
use crate::{YVal, YValTag};
use std::fmt::{Display, Formatter};

/// **(internal)** The `(YValTag, engine tag)` table.
const TAG_TABLE: [(YValTag, i32); 9] = [
    (YValTag::Unknown, TAG_UNKNOWN),
    (YValTag::Bool, TAG_BOOL),
    (YValTag::Rational, TAG_RATIONAL),
    (YValTag::Algebraic, TAG_ALGEBRAIC),
    (YValTag::BitVector, TAG_BV),
    (YValTag::Scalar, TAG_SCALAR),
    (YValTag::Tuple, TAG_TUPLE),
    (YValTag::Function, TAG_FUNCTION),
    (YValTag::Mapping, TAG_MAPPING),
];

impl YValTag {
    /// Decode an engine node tag. Tags outside the known range decode as `Unknown`.
    pub fn from_code(code: i32) -> YValTag {
        TAG_TABLE
            .iter()
            .find(|(_, it)| *it == code)
            .map(|(tag, _)| *tag)
            .unwrap_or(YValTag::Unknown)
    }

    pub fn code(self) -> i32 {
        TAG_TABLE
            .iter()
            .find(|(it, _)| *it == self)
            .map(|(_, code)| *code)
            .unwrap_or(TAG_UNKNOWN)
    }
}

impl YVal {
    /// **(internal)** Wrap a node of the model behind `model`.
    pub(crate) fn new(model: RawHandle, node: RawNode) -> YVal {
        YVal {
            tag: YValTag::from_code(node.tag),
            id: node.id,
            model,
        }
    }

    pub fn tag(&self) -> YValTag {
        self.tag
    }

    /// The index of the node inside its model.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// **(internal)** The engine-level reference to this node.
    pub(crate) fn node(&self) -> RawNode {
        RawNode {
            tag: self.tag.code(),
            id: self.id,
        }
    }

    /// **(internal)** The raw handle of the model this node belongs to.
    pub(crate) fn model(&self) -> RawHandle {
        self.model
    }
}

impl Display for YVal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}#{}", self.tag, self.id)
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::RawNode;
    use crate::{YVal, YValTag};

    #[test]
    fn tag_table_is_bidirectional() {
        for code in 0..9 {
            assert_eq!(YValTag::from_code(code).code(), code);
        }
        assert_eq!(YValTag::from_code(6), YValTag::Tuple);
        assert_eq!(YValTag::from_code(-3), YValTag::Unknown);
        assert_eq!(YValTag::from_code(17), YValTag::Unknown);
    }

    #[test]
    fn nodes_keep_their_model() {
        let value = YVal::new(7, RawNode { tag: 8, id: 3 });
        assert_eq!(value.tag(), YValTag::Mapping);
        assert_eq!(value.node(), RawNode { tag: 8, id: 3 });
        assert_eq!(value.model(), 7);
        assert_eq!(value.to_string(), "Mapping#3");
    }
}
