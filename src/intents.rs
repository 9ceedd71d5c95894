//! Gateway intents.

bitflags::bitflags! {
    /// Bitflags Struct which represents all the possible intents for the Gateway Identify
    /// handshake event, see <https://discord.com/developers/docs/topics/gateway#list-of-intents>.
    /// Some are privileged and require being toggled on in the developer page.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u32 {
        const GUILDS = 1 << 0;

        /// This is a privileged [`Intents`]
        const GUILD_MEMBERS = 1 << 1;
        const GUILD_BANS = 1 << 2;
        const GUILD_EMOJIS_AND_STICKERS = 1 << 3;
        const GUILD_INTEGRATIONS = 1 << 4;
        const GUILD_WEBHOOKS = 1 << 5;
        const GUILD_INVITES = 1 << 6;
        const GUILD_VOICE_STATES = 1 << 7;

        /// This is a privileged [`Intents`]
        const GUILD_PRESENCES = 1 << 8;
        const GUILD_MESSAGES = 1 << 9;
        const GUILD_MESSAGE_REACTIONS = 1 << 10;
        const GUILD_MESSAGE_TYPING = 1 << 11;
        const DIRECT_MESSAGES = 1 << 12;
        const DIRECT_MESSAGE_REACTIONS = 1 << 13;
        const DIRECT_MESSAGE_TYPING = 1 << 14;

        /// This is a privileged [`Intents`]
        const MESSAGE_CONTENT = 1 << 15;
        const GUILD_SCHEDULED_EVENTS = 1 << 16;
        const AUTO_MODERATION_CONFIGURATION = 1 << 20;
        const AUTO_MODERATION_EXECUTION = 1 << 21;
    }
}

/// Every intent the gateway knows about.
pub const ALL_INTENTS: Intents = Intents::all();

/// Intents used when none are configured.
///
/// Lighter than [`ALL_INTENTS`] but still includes the privileged ones, most bots
/// should pick their own set.
pub const DEFAULT_INTENTS: Intents = Intents::GUILDS
    .union(Intents::GUILD_MEMBERS)
    .union(Intents::GUILD_BANS)
    .union(Intents::GUILD_INVITES)
    .union(Intents::GUILD_VOICE_STATES)
    .union(Intents::GUILD_PRESENCES)
    .union(Intents::GUILD_MESSAGES)
    .union(Intents::GUILD_MESSAGE_REACTIONS)
    .union(Intents::GUILD_MESSAGE_TYPING)
    .union(Intents::DIRECT_MESSAGES)
    .union(Intents::DIRECT_MESSAGE_REACTIONS)
    .union(Intents::DIRECT_MESSAGE_TYPING)
    .union(Intents::MESSAGE_CONTENT)
    .union(Intents::GUILD_SCHEDULED_EVENTS);

impl Intents {
    /// Intents which have to be enabled in the developer portal before they can be identified with.
    pub const PRIVILEGED: Intents = Intents::GUILD_MEMBERS
        .union(Intents::GUILD_PRESENCES)
        .union(Intents::MESSAGE_CONTENT);

    /// Whether any privileged intent is part of this set.
    pub fn is_privileged(self) -> bool {
        self.intersects(Self::PRIVILEGED)
    }
}

impl Default for Intents {
    fn default() -> Self {
        DEFAULT_INTENTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_intents_bits() {
        assert_eq!(DEFAULT_INTENTS.bits(), 0b1_1111_1111_1100_0111);
        assert!(!DEFAULT_INTENTS.contains(Intents::GUILD_WEBHOOKS));
        assert!(!DEFAULT_INTENTS.contains(Intents::AUTO_MODERATION_EXECUTION));
    }

    #[test]
    fn privileged_detection() {
        assert!(DEFAULT_INTENTS.is_privileged());
        assert!(!(Intents::GUILDS | Intents::GUILD_MESSAGES).is_privileged());
        assert!(Intents::MESSAGE_CONTENT.is_privileged());
    }

    #[test]
    fn all_intents_contains_everything() {
        assert!(ALL_INTENTS.contains(DEFAULT_INTENTS));
        assert!(ALL_INTENTS.contains(Intents::AUTO_MODERATION_CONFIGURATION));
    }
}
