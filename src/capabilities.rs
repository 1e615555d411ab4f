//! Agent capability bitmask (spec §3), shared between the agent registry
//! and the task queue's capability matching.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u16 {
        const READ_FILES    = 1 << 0;
        const WRITE_FILES   = 1 << 1;
        const EXECUTE       = 1 << 2;
        const BUILD         = 1 << 3;
        const ANALYZE       = 1 << 4;
        const REASON        = 1 << 5;
        const SPAWN         = 1 << 6;
        const INSTALL_DEPS  = 1 << 7;
        const FIX_ERRORS    = 1 << 8;
    }
}

impl Capabilities {
    /// Default capability mask for a given [`crate::agent::AgentType`]
    /// (spec §3).
    pub fn defaults_for(agent_type: crate::agent::AgentType) -> Capabilities {
        use crate::agent::AgentType::*;
        match agent_type {
            Smart => Capabilities::REASON | Capabilities::ANALYZE | Capabilities::FIX_ERRORS,
            Autonomous => {
                Capabilities::READ_FILES
                    | Capabilities::WRITE_FILES
                    | Capabilities::EXECUTE
                    | Capabilities::ANALYZE
                    | Capabilities::REASON
            }
            Build => {
                Capabilities::BUILD
                    | Capabilities::FIX_ERRORS
                    | Capabilities::INSTALL_DEPS
                    | Capabilities::EXECUTE
                    | Capabilities::WRITE_FILES
            }
            Coordinator => Capabilities::SPAWN | Capabilities::REASON | Capabilities::ANALYZE,
            Custom => Capabilities::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentType;

    #[test]
    fn build_defaults_match_spec() {
        let caps = Capabilities::defaults_for(AgentType::Build);
        assert!(caps.contains(Capabilities::BUILD));
        assert!(caps.contains(Capabilities::FIX_ERRORS));
        assert!(caps.contains(Capabilities::INSTALL_DEPS));
        assert!(caps.contains(Capabilities::EXECUTE));
        assert!(caps.contains(Capabilities::WRITE_FILES));
        assert!(!caps.contains(Capabilities::REASON));
    }
}
