use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use buscaminas_core::GameConfig;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("High score I/O failed")]
    Io(#[from] io::Error),
    #[error("Malformed high score record on line {line}")]
    Malformed { line: usize },
}

pub type Result<T> = std::result::Result<T, ScoreError>;

/// The three fixed difficulty tiers, in file order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tier {
    Beginner,
    Intermediate,
    Expert,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Beginner, Tier::Intermediate, Tier::Expert];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Intermediate => "Intermediate",
            Self::Expert => "Expert",
        }
    }

    pub const fn config(self) -> GameConfig {
        match self {
            Self::Beginner => GameConfig::beginner(),
            Self::Intermediate => GameConfig::intermediate(),
            Self::Expert => GameConfig::expert(),
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// One `<seconds> <name>` record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoreEntry {
    pub seconds: u32,
    pub name: String,
}

impl ScoreEntry {
    const DEFAULT_SECONDS: u32 = 999;
    const DEFAULT_NAME: &'static str = "Anonymous";
}

impl Default for ScoreEntry {
    fn default() -> Self {
        Self {
            seconds: Self::DEFAULT_SECONDS,
            name: Self::DEFAULT_NAME.to_string(),
        }
    }
}

/// Best recorded time per difficulty tier, persisted as three text lines.
/// The engine never touches this table; the caller submits a time once a
/// session reports a won outcome.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ScoreTable {
    entries: [ScoreEntry; 3],
}

impl ScoreTable {
    pub fn entry(&self, tier: Tier) -> &ScoreEntry {
        &self.entries[tier.index()]
    }

    /// Records a finished game, keeping only strictly better times.
    pub fn submit(&mut self, tier: Tier, seconds: u32, name: &str) -> bool {
        let entry = &mut self.entries[tier.index()];
        if seconds < entry.seconds {
            log::debug!("new {} record: {}s by {}", tier.label(), seconds, name);
            *entry = ScoreEntry {
                seconds,
                name: name.to_string(),
            };
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Parses the three-line score file. The name is everything after the
    /// first whitespace run, so names may contain spaces.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries: [ScoreEntry; 3] = Default::default();
        let mut lines = text.lines();

        for (i, entry) in entries.iter_mut().enumerate() {
            let line = i + 1;
            let record = lines.next().ok_or(ScoreError::Malformed { line })?;
            let (seconds, name) = record
                .split_once(char::is_whitespace)
                .ok_or(ScoreError::Malformed { line })?;
            let seconds = seconds
                .parse()
                .map_err(|_| ScoreError::Malformed { line })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ScoreError::Malformed { line });
            }
            *entry = ScoreEntry {
                seconds,
                name: name.to_string(),
            };
        }

        Ok(Self { entries })
    }

    /// Reads the score file, seeding it with defaults when missing.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("seeding high score file at {}", path.display());
                let table = Self::default();
                table.save(path)?;
                Ok(table)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_string())?;
        Ok(())
    }
}

impl fmt::Display for ScoreTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{} {}", entry.seconds, entry.name)?;
        }
        Ok(())
    }
}
