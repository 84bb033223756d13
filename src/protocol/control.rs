//! Control Messages
//!
//! Control actions share the envelope shape with game moves but are
//! handled by the dispatcher's fixed sequences, never by a game
//! controller. Their tags are reserved across every game's vocabulary.

use crate::game::Adjudication;
use crate::protocol::{Envelope, ProtocolError, WireMessage};

/// Reserved tag: a client claims its game has ended.
pub const GAME_OVER: &str = "game_over";
/// Reserved tag: a client asks for a snapshot of the live game.
pub const RESYNC: &str = "resync";

/// Whether a tag is reserved for the dispatcher.
pub fn is_reserved(tag: &str) -> bool {
    tag == GAME_OVER || tag == RESYNC
}

const CLAIM_WIN: i32 = 0;
const CLAIM_LOSE: i32 = 1;
const CLAIM_DRAW: i32 = 2;

/// A client's claimed outcome for itself. The server verifies the claim
/// against its own check; the claim itself never propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOverClaim {
    /// The outcome the sender claims for its own seat.
    pub claim: Adjudication,
}

impl WireMessage for GameOverClaim {
    const TAG: &'static str = GAME_OVER;

    fn encode(&self) -> Envelope {
        let code = match self.claim {
            Adjudication::Win => CLAIM_WIN,
            Adjudication::Lose => CLAIM_LOSE,
            Adjudication::Draw => CLAIM_DRAW,
            // Claiming "undetermined" is meaningless; it still encodes so
            // the inverse property holds, and the server rejects it.
            Adjudication::Undetermined => -1,
        };
        Envelope::new(Self::TAG).with_status(code)
    }

    fn decode(envelope: &Envelope) -> Result<Self, ProtocolError> {
        envelope.expect_tag(Self::TAG)?;
        let claim = match envelope.status()? {
            CLAIM_WIN => Adjudication::Win,
            CLAIM_LOSE => Adjudication::Lose,
            CLAIM_DRAW => Adjudication::Draw,
            -1 => Adjudication::Undetermined,
            status => {
                return Err(ProtocolError::UnknownStatus {
                    tag: Self::TAG.to_string(),
                    status,
                })
            }
        };
        Ok(Self { claim })
    }
}

/// A request for a point-in-time snapshot; carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncRequest;

impl WireMessage for ResyncRequest {
    const TAG: &'static str = RESYNC;

    fn encode(&self) -> Envelope {
        Envelope::new(Self::TAG)
    }

    fn decode(envelope: &Envelope) -> Result<Self, ProtocolError> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self)
    }
}
