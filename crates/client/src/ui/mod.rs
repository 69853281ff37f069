// Dashboard: score, payoff, timer, round, and the message log
use protocol::PlayerId;

use crate::config::Config;
use crate::players::{Player, PlayerSet};

/// Oldest messages are dropped beyond this.
pub const MAX_MESSAGES: usize = 500;

/// Which standings a leaderboard announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standings {
    Round(u32),
    Final,
}

#[derive(Debug, Default)]
pub struct Dashboard {
    pub score: i64,
    pub dollars: f64,
    /// Seconds left, never negative.
    pub remaining_time: i64,
    pub round: u32,
    /// Donation controls usable right now.
    pub donation_enabled: bool,
    pub game_over: bool,
    messages: Vec<String>,
    read: usize,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, ego: Option<&Player>, remaining_time: f64, round: u32) {
        self.remaining_time = remaining_time.round().max(0.0) as i64;
        self.round = round;
        if let Some(ego) = ego {
            self.score = ego.score.round() as i64;
            self.dollars = ego.payoff;
        }
    }

    pub fn push_message(&mut self, text: impl Into<String>) {
        self.messages.push(text.into());
        if self.messages.len() > MAX_MESSAGES {
            let excess = self.messages.len() - MAX_MESSAGES;
            self.messages.drain(..excess);
            self.read = self.read.saturating_sub(excess);
        }
    }

    pub fn moderator(&mut self, text: &str) {
        self.push_message(format!("Moderator: {}", text));
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Messages added since the previous call.
    pub fn unread(&mut self) -> &[String] {
        let start = self.read;
        self.read = self.messages.len();
        &self.messages[start..]
    }

    pub fn chat(&mut self, players: &PlayerSet, sender: &PlayerId, index: Option<u32>, contents: &str) {
        let name = display_name(players, sender, index);
        self.push_message(format!("{}: {}", name, contents));
    }

    pub fn color_changed(&mut self, players: &PlayerSet, id: &PlayerId, index: Option<u32>, old: Option<&str>, new: &str) {
        let name = display_name(players, id, index);
        self.moderator(&format!(
            "{} changed from team {} to team {}.",
            name,
            old.unwrap_or("?"),
            new
        ));
    }

    pub fn donation_processed(&mut self, players: &PlayerSet, config: &Config, donor: &PlayerId, recipient: &str, amount: f64) {
        let donor_name = if players.is_ego(donor) {
            "You".to_string()
        } else {
            format!("Player {}", players.get(donor).map(|p| p.name.as_str()).unwrap_or(donor.as_str()))
        };
        let recipient_name = if recipient == players.ego_id().as_str() {
            "you".to_string()
        } else if recipient == "all" {
            "all players".to_string()
        } else if let Some(index) = recipient.strip_prefix("group:") {
            let team = index
                .parse::<usize>()
                .ok()
                .and_then(|i| config.player.colors.get(i))
                .map(|c| c.name.as_str())
                .unwrap_or(index);
            format!("all {} players", team)
        } else {
            players
                .get(&PlayerId::new(recipient))
                .map(|p| p.name.clone())
                .unwrap_or_else(|| recipient.to_string())
        };
        let unit = if amount == 1.0 { "point" } else { "points" };
        self.push_message(format!("{} contributed {} {} to {}.", donor_name, amount, unit, recipient_name));
    }

    /// Announce group and/or individual standings.
    pub fn leaderboard(&mut self, standings: Standings, players: &PlayerSet, config: &Config) {
        let (group, individual) = (config.features.leaderboard_group, config.features.leaderboard_individual);
        if !group && !individual {
            return;
        }
        match standings {
            Standings::Round(round) => self.moderator(&format!("the round {} standings are...", round)),
            Standings::Final => self.moderator("the final standings are..."),
        }
        if group {
            if individual {
                self.push_message("Group");
            }
            for g in players.group_scores() {
                self.push_message(format!("{:>6}  {}", g.score, g.color));
            }
        }
        if individual {
            if group {
                self.push_message("Individual");
            }
            for p in players.player_scores() {
                let mut name = p.name.clone();
                if players.is_ego(&p.id) {
                    name.push_str(" (You)");
                }
                self.push_message(format!("{:>6}  {}", p.score.round() as i64, name));
            }
        }
    }
}

fn display_name(players: &PlayerSet, id: &PlayerId, index: Option<u32>) -> String {
    match (players.get(id), index) {
        (Some(p), _) if !p.name.is_empty() => p.name.clone(),
        (_, Some(i)) => format!("Player {}", i),
        _ => format!("Player {}", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ItemCatalog;
    use protocol::{PlayerState, Position};

    fn players() -> PlayerSet {
        let mut set = PlayerSet::new(PlayerId::new("1"), 10, 10, &Default::default());
        let mut a = PlayerState::new("1", Position::new(0, 0));
        a.name = "Ada".into();
        a.color = "BLUE".into();
        a.score = 4.4;
        a.payoff = 1.25;
        let mut b = PlayerState::new("2", Position::new(0, 1));
        b.name = "Bo".into();
        b.color = "RED".into();
        b.score = 9.0;
        set.update(&[a, b], &ItemCatalog::default());
        set
    }

    #[test]
    fn test_update_from_ego() {
        let players = players();
        let mut dash = Dashboard::new();
        dash.update(players.ego(), -3.2, 2);
        assert_eq!(dash.score, 4);
        assert_eq!(dash.dollars, 1.25);
        assert_eq!(dash.remaining_time, 0);
        assert_eq!(dash.round, 2);
    }

    #[test]
    fn test_leaderboard_lines() {
        let players = players();
        let mut dash = Dashboard::new();
        dash.leaderboard(Standings::Round(1), &players, &Config::default());
        let lines = dash.unread().to_vec();
        assert_eq!(lines[0], "Moderator: the round 1 standings are...");
        assert_eq!(lines[1], "Group");
        assert!(lines[2].ends_with("RED"));
        assert!(lines.iter().any(|l| l.ends_with("Ada (You)")));
        assert!(dash.unread().is_empty());
    }

    #[test]
    fn test_message_log_capped() {
        let mut dash = Dashboard::new();
        for i in 0..MAX_MESSAGES {
            dash.push_message(format!("m{}", i));
        }
        assert_eq!(dash.unread().len(), MAX_MESSAGES);
        dash.push_message("late");
        dash.push_message("later");
        assert_eq!(dash.messages().len(), MAX_MESSAGES);
        assert_eq!(dash.messages()[0], "m2");
        assert_eq!(dash.unread(), &["late".to_string(), "later".to_string()]);

        for i in 0..MAX_MESSAGES + 10 {
            dash.push_message(format!("n{}", i));
        }
        let unread = dash.unread();
        assert_eq!(unread.len(), MAX_MESSAGES);
        assert_eq!(unread[0], "n10");
    }

    #[test]
    fn test_leaderboard_disabled() {
        let mut config = Config::default();
        config.features.leaderboard_group = false;
        config.features.leaderboard_individual = false;
        let mut dash = Dashboard::new();
        dash.leaderboard(Standings::Final, &players(), &config);
        assert!(dash.messages().is_empty());
    }

    #[test]
    fn test_donation_text() {
        let players = players();
        let config = Config::default();
        let mut dash = Dashboard::new();
        dash.donation_processed(&players, &config, &PlayerId::new("1"), "group:3", 1.0);
        dash.donation_processed(&players, &config, &PlayerId::new("2"), "1", 2.0);
        assert_eq!(dash.messages()[0], "You contributed 1 point to all RED players.");
        assert_eq!(dash.messages()[1], "Player Bo contributed 2 points to you.");
    }

    #[test]
    fn test_chat_names() {
        let players = players();
        let mut dash = Dashboard::new();
        dash.chat(&players, &PlayerId::new("2"), Some(2), "hi");
        dash.chat(&players, &PlayerId::new("7"), Some(7), "yo");
        assert_eq!(dash.messages(), &["Bo: hi".to_string(), "Player 7: yo".to_string()]);
    }
}
