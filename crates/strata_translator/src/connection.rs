//! Deferred node-to-node references.

use strata_render::NodeHandle;

/// Components an output can be linked from individually.
const OUTPUT_COMPONENTS: &str = "xyzrgba";

/// Target used to request an explicit null reference.
pub const NULL_TARGET: &str = "NULL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    /// Attribute fed from another node's output
    Link,
    /// Node pointer (shader assignment, instance target)
    Ptr,
    /// Ordered list of node pointers, targets separated by spaces
    Array,
}

/// A reference from `source.attribute` to the node(s) named by `target`,
/// resolved once the target nodes exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub source: NodeHandle,
    pub attribute: String,
    /// Node name or prim path; space separated for arrays
    pub target: String,
    pub kind: ConnectionKind,
    /// Output property on the target (`outputs:rgb`, `outputs:r`)
    pub output: String,
}

impl Connection {
    pub fn new(
        source: NodeHandle,
        attribute: impl Into<String>,
        target: impl Into<String>,
        kind: ConnectionKind,
    ) -> Self {
        Self {
            source,
            attribute: attribute.into(),
            target: target.into(),
            kind,
            output: String::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Single output component to link from, when the output names one
    /// (`outputs:r` -> `r`).
    pub fn output_component(&self) -> Option<char> {
        let mut chars = self.output.chars().rev();
        let component = chars.next()?;
        let separator = chars.next()?;
        (separator == ':' && OUTPUT_COMPONENTS.contains(component)).then_some(component)
    }

    /// Targets of an array connection, in order.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.target.split(' ').filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_render::Universe;

    fn handle() -> NodeHandle {
        Universe::new().create_node("image", "img", None).unwrap()
    }

    #[test]
    fn test_output_component() {
        let conn = Connection::new(handle(), "base_color", "/Tex", ConnectionKind::Link);
        assert_eq!(conn.output_component(), None);

        assert_eq!(conn.clone().with_output("outputs:r").output_component(), Some('r'));
        assert_eq!(conn.clone().with_output("outputs:x").output_component(), Some('x'));
        assert_eq!(conn.clone().with_output("outputs:rgb").output_component(), None);
        assert_eq!(conn.clone().with_output("outputs:q").output_component(), None);
        assert_eq!(conn.with_output("r").output_component(), None);
    }

    #[test]
    fn test_array_targets() {
        let conn = Connection::new(handle(), "shader", "/A  /B NULL", ConnectionKind::Array);
        assert_eq!(conn.targets().collect::<Vec<_>>(), vec!["/A", "/B", "NULL"]);
    }
}
