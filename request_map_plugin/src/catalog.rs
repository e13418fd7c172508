use crate::command::Selector;
use crate::protocol::MapEntry;

/// Latest map rotation pushed by the host. Replaced wholesale on every `MapList`.
#[derive(Debug, Default, Clone)]
pub struct MapCatalog {
    maps: Vec<MapEntry>,
}

impl MapCatalog {
    pub fn new(maps: Vec<MapEntry>) -> Self {
        Self { maps }
    }

    pub fn replace(&mut self, maps: Vec<MapEntry>) {
        self.maps = maps;
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MapEntry> {
        self.maps.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MapEntry> {
        self.maps.iter()
    }

    /// `"<display name> <mode tag>"`, as shown in chat.
    pub fn label(&self, index: usize) -> Option<String> {
        self.get(index).map(entry_label)
    }

    pub fn resolve(&self, selector: &Selector) -> Option<usize> {
        match selector {
            Selector::Index(i) => (*i < self.maps.len()).then_some(*i),
            Selector::Words(words) => {
                let keys: Vec<String> = words
                    .iter()
                    .map(|w| w.to_lowercase())
                    .filter(|w| !w.is_empty())
                    .collect();
                if keys.is_empty() {
                    return None;
                }
                self.maps.iter().position(|m| {
                    let name = m.display_name.to_lowercase();
                    keys.iter().any(|k| name.contains(k.as_str()))
                })
            }
        }
    }

    /// Position of the rotation entry with this exact map file and mode.
    pub fn find(&self, internal_name: &str, mode: &str) -> Option<usize> {
        self.maps
            .iter()
            .position(|m| m.internal_name == internal_name && m.mode == mode)
    }
}

pub fn entry_label(entry: &MapEntry) -> String {
    let tag = game_mode_to_short(&entry.mode);
    if tag.is_empty() {
        entry.display_name.clone()
    } else {
        format!("{} {}", entry.display_name, tag)
    }
}

pub fn game_mode_to_short(mode: &str) -> &'static str {
    match mode {
        "ConquestLarge0" | "ConquestSmall0" => "[CQ]",
        "ConquestAssaultSmall0" | "ConquestAssaultSmall1" | "ConquestAssaultLarge0" => "[CQA]",
        "Domination0" => "[CQDOM]",
        "RushLarge0" => "[RUSH]",
        "SquadRush0" => "[SQRUSH]",
        "SquadDeathMatch0" => "[SQDM]",
        "TeamDeathMatch0" | "TeamDeathMatchC0" => "[TDM]",
        "TankSuperiority0" => "[TS]",
        "Scavenger0" => "[SC]",
        "CaptureTheFlag0" => "[CTF]",
        "AirSuperiority0" => "[AS]",
        "GunMaster0" => "[GM]",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: usize, internal: &str, mode: &str, display: &str) -> MapEntry {
        MapEntry {
            index,
            internal_name: internal.to_string(),
            mode: mode.to_string(),
            display_name: display.to_string(),
        }
    }

    fn catalog() -> MapCatalog {
        MapCatalog::new(vec![
            entry(0, "XP0_Metro", "ConquestLarge0", "Metro"),
            entry(1, "XP1_Firestorm", "RushLarge0", "Firestorm"),
            entry(2, "MP_Subway", "Unknown0", "Operation Metro 2014"),
        ])
    }

    #[test]
    fn words_match_any_token_in_catalog_order() {
        let c = catalog();
        let sel = Selector::Words(vec!["fire".into(), "storm".into()]);
        assert_eq!(c.resolve(&sel), Some(1));

        let sel = Selector::Words(vec!["METRO".into()]);
        assert_eq!(c.resolve(&sel), Some(0));

        let sel = Selector::Words(vec!["nowhere".into(), "2014".into()]);
        assert_eq!(c.resolve(&sel), Some(2));
    }

    #[test]
    fn empty_or_out_of_range_selectors_do_not_resolve() {
        let c = catalog();
        assert_eq!(c.resolve(&Selector::Words(vec![])), None);
        assert_eq!(c.resolve(&Selector::Index(3)), None);
        assert_eq!(c.resolve(&Selector::Index(2)), Some(2));
        assert_eq!(MapCatalog::default().resolve(&Selector::Index(0)), None);
    }

    #[test]
    fn labels_carry_mode_tag_when_known() {
        let c = catalog();
        assert_eq!(c.label(0).as_deref(), Some("Metro [CQ]"));
        assert_eq!(c.label(1).as_deref(), Some("Firestorm [RUSH]"));
        assert_eq!(c.label(2).as_deref(), Some("Operation Metro 2014"));
        assert_eq!(c.label(9), None);
    }

    #[test]
    fn find_matches_file_and_mode() {
        let c = catalog();
        assert_eq!(c.find("XP1_Firestorm", "RushLarge0"), Some(1));
        assert_eq!(c.find("XP1_Firestorm", "ConquestLarge0"), None);
    }
}
