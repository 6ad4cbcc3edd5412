//! Globally unique numeric IDs.
//!
//! Every record ID is a 32-bit value whose top 4 bits name the record type
//! and whose low 28 bits are the record's local index.

/// Total bits in a global ID.
const GLOBAL_BITS: u32 = 32;

/// Bits reserved for the type namespace.
const NAMESPACE_BITS: u32 = 4;

/// Bits left for the local index.
const LOCAL_BITS: u32 = GLOBAL_BITS - NAMESPACE_BITS;

/// Mask selecting the local index.
const LOCAL_MASK: u32 = (1 << LOCAL_BITS) - 1;

/// Record types that carry a global ID, in namespace order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdNamespace {
    Models,
    Tests,
    Paths,
    Edges,
    Evidences,
    Docs,
    Nodes,
    Groups,
}

impl IdNamespace {
    const ALL: [Self; 8] = [
        Self::Models,
        Self::Tests,
        Self::Paths,
        Self::Edges,
        Self::Evidences,
        Self::Docs,
        Self::Nodes,
        Self::Groups,
    ];

    fn index(self) -> u32 {
        self as u32
    }

    /// Turn a local index into a global ID.
    ///
    /// Local indices wider than 28 bits are truncated to the mask.
    pub fn global(self, local: usize) -> u32 {
        (self.index() << LOCAL_BITS) | (local as u32 & LOCAL_MASK)
    }

    /// Split a global ID back into its namespace and local index.
    pub fn split(global: u32) -> Option<(Self, u32)> {
        let namespace = Self::ALL.get((global >> LOCAL_BITS) as usize).copied()?;
        Some((namespace, global & LOCAL_MASK))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_occupy_top_bits() {
        assert_eq!(IdNamespace::Models.global(5), 5);
        assert_eq!(IdNamespace::Edges.global(0), 0x3000_0000);
        assert_eq!(IdNamespace::Groups.global(1), 0x7000_0001);
    }

    #[test]
    fn split_recovers_namespace_and_local() {
        let id = IdNamespace::Nodes.global(1234);
        assert_eq!(IdNamespace::split(id), Some((IdNamespace::Nodes, 1234)));
        assert_eq!(IdNamespace::split(0xF000_0000), None);
    }
}
