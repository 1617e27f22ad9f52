//! Capability flags attached to every component type.

use bitflags::bitflags;

bitflags! {
    /// Properties of a component type. They depend only on the type, never on
    /// the instance, and callers must consult them before assuming anything
    /// about buffer aliasing or output initialisation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ComponentProperties: u32 {
        /// Output rows correspond one-to-one to input rows and the component
        /// ignores the row indexes.
        const SIMPLE_COMPONENT = 0x001;
        /// The component has trainable parameters.
        const UPDATABLE_COMPONENT = 0x002;
        /// alpha times the input gives alpha times the output.
        const LINEAR_IN_INPUT = 0x004;
        /// alpha times the parameters gives alpha times the output.
        const LINEAR_IN_PARAMETERS = 0x008;
        /// Backprop reads the forward-pass input.
        const BACKPROP_NEEDS_INPUT = 0x010;
        /// Backprop reads the forward-pass output.
        const BACKPROP_NEEDS_OUTPUT = 0x020;
        /// Propagate may run with input and output in the same buffer.
        const PROPAGATE_IN_PLACE = 0x040;
        /// Backprop may run with out_deriv and in_deriv in the same buffer.
        const BACKPROP_IN_PLACE = 0x080;
        /// Propagate adds to the output instead of overwriting it.
        const PROPAGATE_ADDS = 0x100;
        /// Backprop adds to in_deriv instead of overwriting it.
        const BACKPROP_ADDS = 0x200;
    }
}

impl ComponentProperties {
    pub fn is_simple(self) -> bool {
        self.contains(Self::SIMPLE_COMPONENT)
    }

    pub fn is_updatable(self) -> bool {
        self.contains(Self::UPDATABLE_COMPONENT)
    }
}
