//! Built-in rule sets, one per (data provider, message type) stream.

pub mod thea;
pub mod wydot;

use crate::error::StreamError;
use crate::flatten::types::RuleSet;
use std::fmt;
use std::str::FromStr;

/// Connected-vehicle pilot that produced the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Provider {
    /// Wyoming DOT
    Wydot,
    /// Tampa Hillsborough Expressway Authority
    Thea,
}

/// J2735 message family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum MessageType {
    /// Basic Safety Message
    Bsm,
    /// Traveler Information Message
    Tim,
    /// Signal Phase and Timing
    Spat,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Wydot, Provider::Thea];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Wydot => "wydot",
            Provider::Thea => "thea",
        }
    }
}

impl MessageType {
    pub const ALL: [MessageType; 3] = [MessageType::Bsm, MessageType::Tim, MessageType::Spat];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Bsm => "bsm",
            MessageType::Tim => "tim",
            MessageType::Spat => "spat",
        }
    }

    /// Folder name in the partitioned layout, e.g. "BSM"
    pub fn folder_name(&self) -> String {
        self.as_str().to_ascii_uppercase()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wydot" => Ok(Provider::Wydot),
            "thea" => Ok(Provider::Thea),
            _ => Err(StreamError::UnknownProvider(s.to_string())),
        }
    }
}

impl FromStr for MessageType {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bsm" => Ok(MessageType::Bsm),
            "tim" => Ok(MessageType::Tim),
            "spat" => Ok(MessageType::Spat),
            _ => Err(StreamError::UnknownMessageType(s.to_string())),
        }
    }
}

impl RuleSet {
    /// The built-in rule set for a stream
    pub fn for_stream(provider: Provider, message_type: MessageType) -> RuleSet {
        match (provider, message_type) {
            (Provider::Wydot, MessageType::Bsm) => wydot::bsm(),
            (Provider::Wydot, MessageType::Tim) => wydot::tim(),
            (Provider::Wydot, MessageType::Spat) => wydot::spat(),
            (Provider::Thea, MessageType::Bsm) => thea::bsm(),
            (Provider::Thea, MessageType::Tim) => thea::tim(),
            (Provider::Thea, MessageType::Spat) => thea::spat(),
        }
    }
}

/// Stream label used in rule-set names and logs, e.g. "wydot/BSM"
pub(crate) fn stream_name(provider: Provider, message_type: MessageType) -> String {
    format!("{}/{}", provider, message_type.folder_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("WYDOT".parse::<Provider>().unwrap(), Provider::Wydot);
        assert_eq!(" thea ".parse::<Provider>().unwrap(), Provider::Thea);
        assert_eq!("SPaT".parse::<MessageType>().unwrap(), MessageType::Spat);
        assert_eq!(
            "nycdot".parse::<Provider>().unwrap_err(),
            StreamError::UnknownProvider("nycdot".to_string())
        );
        assert!("psm".parse::<MessageType>().is_err());
    }

    #[test]
    fn test_every_stream_has_rules() {
        for provider in Provider::ALL {
            for message_type in MessageType::ALL {
                let rules = RuleSet::for_stream(provider, message_type);
                assert_eq!(rules.name, stream_name(provider, message_type));
                assert_eq!(rules.separator, "_");
            }
        }
    }
}
