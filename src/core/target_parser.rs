use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// One world-map coordinate to visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub x: i32,
    pub y: i32,
}

fn xy_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?ix)
              \( \s* x \s* y \s* : \s*

              (?P<x> -?\d+ )
              \s+
              (?P<y> -?\d+ )
              \s* \)",
        )
        .expect("static coordinate pattern")
    })
}

fn monster_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*Lv\s*(\d+)\s+([^(]+?)\s*(?:\(|$)").expect("static monster pattern")
    })
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"))
}

/// Extract `(xy: X Y)` pairs from pasted chat or report text.
///
/// Example: "Lv21 Azazel (xy: 460 589) 144km" -> [Target { x: 460, y: 589 }]
///
/// Malformed pairs are skipped, repeated pairs keep their first position.
pub fn parse_targets(input: &str) -> Vec<Target> {
    let normalized = input
        .replace('\u{00A0}', " ")
        .replace('\u{2007}', " ")
        .replace('\u{202F}', " ");

    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for caps in xy_regex().captures_iter(&normalized) {
        let (Ok(x), Ok(y)) = (caps["x"].parse::<i32>(), caps["y"].parse::<i32>()) else {
            continue;
        };
        let target = Target { x, y };
        if seen.insert(target) {
            targets.push(target);
        }
    }
    targets
}

#[derive(Debug, Clone)]
struct MonsterEntry<'a> {
    level: u32,
    name: String,
    line: &'a str,
}

fn parse_monster_line(line: &str) -> Option<MonsterEntry<'_>> {
    let caps = monster_regex().captures(line)?;
    let level = caps.get(1)?.as_str().parse().ok()?;
    let name = whitespace_regex()
        .replace_all(caps.get(2)?.as_str().trim(), " ")
        .into_owned();
    Some(MonsterEntry { level, name, line })
}

fn is_priority(name: &str, priority: &str) -> bool {
    let priority = priority.trim();
    if priority.is_empty() {
        return false;
    }
    let name = name.to_lowercase();
    let priority = priority.to_lowercase();
    name == priority || name.starts_with(&format!("{} ", priority))
}

/// Reorder a monster report: the `priority` boss first (highest level first),
/// then every other boss grouped by name A-Z, each group by level descending.
/// Lines that do not start with `Lv <level> <name>` are dropped.
pub fn sort_monster_lines(text: &str, priority: &str) -> String {
    let parsed: Vec<MonsterEntry> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_monster_line)
        .collect();

    let (mut first, mut rest): (Vec<_>, Vec<_>) = parsed
        .into_iter()
        .partition(|entry| is_priority(&entry.name, priority));

    // Stable sorts keep input order among equal keys
    first.sort_by(|a, b| b.level.cmp(&a.level));
    rest.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(b.level.cmp(&a.level))
    });

    first
        .iter()
        .chain(rest.iter())
        .map(|entry| entry.line)
        .collect::<Vec<_>>()
        .join("\n")
}
