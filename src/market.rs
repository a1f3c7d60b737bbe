//! Service proposals advertised by the provider.

use crate::identity::Identity;
use serde::{Deserialize, Serialize};

/// Identifier of an advertised proposal.
pub type ProposalId = i64;

/// A provider's advertised service offer.
///
/// Sessions are only admitted against the proposal currently advertised by
/// the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProposal {
    /// Proposal identifier that consumers must reference.
    pub id: ProposalId,
    /// Identity of the provider offering the service.
    pub provider_id: Identity,
    /// Kind of service offered, e.g. `wireguard` or `openvpn`.
    pub service_type: String,
}

impl ServiceProposal {
    /// Create a proposal.
    #[must_use]
    pub fn new(id: ProposalId, provider_id: Identity, service_type: impl Into<String>) -> Self {
        Self {
            id,
            provider_id,
            service_type: service_type.into(),
        }
    }
}
