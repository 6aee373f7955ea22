use serde::{Deserialize, Serialize};

/// Tournament lifecycle. A tournament only ever moves forward through these
/// stages; `rated` tournaments that accumulate result edits are flagged via
/// signature mismatch, they never leave the `rated` stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Initial,
    Ready,
    Queued,
    Rated,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::Ready => "ready",
            Stage::Queued => "queued",
            Stage::Rated => "rated",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "initial" => Ok(Stage::Initial),
            "ready" => Ok(Stage::Ready),
            "queued" => Ok(Stage::Queued),
            "rated" => Ok(Stage::Rated),
            other => Err(format!("unknown tournament stage: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerCategory {
    /// Federation member with an ICU id; ratings carry across tournaments.
    IcuPlayer,
    /// Guest rated by their FIDE rating, which stays fixed.
    ForeignPlayer,
    /// First appearance, no prior rating of any kind.
    NewPlayer,
}

impl PlayerCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerCategory::IcuPlayer => "icu_player",
            PlayerCategory::ForeignPlayer => "foreign_player",
            PlayerCategory::NewPlayer => "new_player",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "icu_player" => Ok(PlayerCategory::IcuPlayer),
            "foreign_player" => Ok(PlayerCategory::ForeignPlayer),
            "new_player" => Ok(PlayerCategory::NewPlayer),
            other => Err(format!("unknown player category: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "W",
            Outcome::Loss => "L",
            Outcome::Draw => "D",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "W" => Ok(Outcome::Win),
            "L" => Ok(Outcome::Loss),
            "D" => Ok(Outcome::Draw),
            other => Err(format!("unknown result outcome: {other}")),
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Loss => 0.0,
            Outcome::Draw => 0.5,
        }
    }

    /// The opponent's mirrored outcome for the same game.
    pub fn opposite(&self) -> Self {
        match self {
            Outcome::Win => Outcome::Loss,
            Outcome::Loss => Outcome::Win,
            Outcome::Draw => Outcome::Draw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Colour {
    White,
    Black,
}

impl Colour {
    pub fn as_str(&self) -> &'static str {
        match self {
            Colour::White => "W",
            Colour::Black => "B",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "W" => Ok(Colour::White),
            "B" => Ok(Colour::Black),
            other => Err(format!("unknown colour: {other}")),
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Colour::White => Colour::Black,
            Colour::Black => Colour::White,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Waiting,
    Processing,
    Finished,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Waiting => "waiting",
            RunStatus::Processing => "processing",
            RunStatus::Finished => "finished",
            RunStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "waiting" => Ok(RunStatus::Waiting),
            "processing" => Ok(RunStatus::Processing),
            "finished" => Ok(RunStatus::Finished),
            "error" => Ok(RunStatus::Error),
            other => Err(format!("unknown run status: {other}")),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Waiting | RunStatus::Processing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionCategory {
    Lifetime,
    Annual,
}

impl SubscriptionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionCategory::Lifetime => "lifetime",
            SubscriptionCategory::Annual => "annual",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "lifetime" => Ok(SubscriptionCategory::Lifetime),
            "annual" => Ok(SubscriptionCategory::Annual),
            other => Err(format!("unknown subscription category: {other}")),
        }
    }
}
