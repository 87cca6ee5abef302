// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authorization matrix for outbound messages and interrupts.
//!
//! Pure functions of the sender identity and the fleet width. Denied
//! recipients are reported back to the model in tool results; they are
//! never fatal.

use crate::agent::AgentId;

/// Recipients a given agent may address with `sendMessage`.
///
/// - shogun → king, karou
/// - karou → shogun plus every ashigaru
/// - ashigaruN → karou plus every other ashigaru
/// - king → shogun (the human entry point into the chain)
pub fn allowed_recipients(agent: AgentId, ashigaru_count: u32) -> Vec<AgentId> {
    match agent {
        AgentId::King => vec![AgentId::Shogun],
        AgentId::Shogun => vec![AgentId::King, AgentId::Karou],
        AgentId::Karou => {
            let mut out = vec![AgentId::Shogun];
            out.extend((1..=ashigaru_count).map(AgentId::Ashigaru));
            out
        }
        AgentId::Ashigaru(me) => {
            let mut out = vec![AgentId::Karou];
            out.extend((1..=ashigaru_count).filter(|n| *n != me).map(AgentId::Ashigaru));
            out
        }
    }
}

/// Interrupt authorization is stricter than mail: only the direct superior
/// may interrupt (shogun → karou, karou → any ashigaru).
pub fn may_interrupt(from: AgentId, to: AgentId) -> bool {
    matches!(
        (from, to),
        (AgentId::Shogun, AgentId::Karou) | (AgentId::Karou, AgentId::Ashigaru(_))
    )
}

/// Default superior for tool-less auto-replies.
pub fn superior(agent: AgentId) -> Option<AgentId> {
    match agent {
        AgentId::King => None,
        AgentId::Shogun => Some(AgentId::King),
        AgentId::Karou => Some(AgentId::Shogun),
        AgentId::Ashigaru(_) => Some(AgentId::Karou),
    }
}

#[cfg(test)]
#[path = "authz_tests.rs"]
mod tests;
