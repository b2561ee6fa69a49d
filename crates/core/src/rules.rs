use crate::models::{Method, RoutingCandidate};
use crate::signature::{ExtensionClass, Signature};
use anyhow::Context;
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Glob over the whole signature key, e.g. `*fattur*`.
    Glob { pattern: String },
    /// One of the signature's tokens equals `token`.
    Token { token: String },
    ExtensionClass { class: ExtensionClass },
    All { all: Vec<Condition> },
    Any { any: Vec<Condition> },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Rule {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub target: Vec<String>,
    pub confidence: f32,
    pub condition: Condition,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone)]
enum Compiled {
    Glob(GlobMatcher),
    Token(String),
    ExtensionClass(ExtensionClass),
    All(Vec<Compiled>),
    Any(Vec<Compiled>),
}

impl Compiled {
    fn build(condition: &Condition) -> anyhow::Result<Self> {
        Ok(match condition {
            Condition::Glob { pattern } => Compiled::Glob(
                Glob::new(&pattern.to_lowercase())
                    .with_context(|| format!("invalid glob {pattern:?}"))?
                    .compile_matcher(),
            ),
            Condition::Token { token } => Compiled::Token(token.to_lowercase()),
            Condition::ExtensionClass { class } => Compiled::ExtensionClass(*class),
            Condition::All { all } => {
                Compiled::All(all.iter().map(Compiled::build).collect::<Result<_, _>>()?)
            }
            Condition::Any { any } => {
                Compiled::Any(any.iter().map(Compiled::build).collect::<Result<_, _>>()?)
            }
        })
    }

    fn matches(&self, sig: &Signature) -> bool {
        match self {
            Compiled::Glob(m) => m.is_match(&sig.key),
            Compiled::Token(token) => sig.tokens().any(|t| t == token),
            Compiled::ExtensionClass(class) => sig.extension_class == *class,
            Compiled::All(all) => all.iter().all(|c| c.matches(sig)),
            Compiled::Any(any) => any.iter().any(|c| c.matches(sig)),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: Rule,
    condition: Compiled,
}

/// Ordered rule table. The first enabled rule whose condition holds decides;
/// later rules are never consulted, even if they would be more specific.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> anyhow::Result<Self> {
        let mut set = RuleSet::default();
        set.extend(rules)?;
        Ok(set)
    }

    pub fn builtin() -> Self {
        // The built-in table is static and known to compile.
        Self::new(builtin_rules()).unwrap_or_default()
    }

    pub fn extend(&mut self, rules: Vec<Rule>) -> anyhow::Result<()> {
        for rule in rules {
            if !(0.0..=1.0).contains(&rule.confidence) {
                anyhow::bail!(
                    "rule {} has confidence {} outside [0, 1]",
                    rule.name,
                    rule.confidence
                );
            }
            if rule.target.is_empty() {
                anyhow::bail!("rule {} has an empty target", rule.name);
            }
            let condition =
                Compiled::build(&rule.condition).with_context(|| format!("rule {}", rule.name))?;
            self.rules.push(CompiledRule { rule, condition });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn first_match(&self, sig: &Signature) -> Option<(&Rule, RoutingCandidate)> {
        self.rules
            .iter()
            .find(|r| r.rule.enabled && r.condition.matches(sig))
            .map(|r| {
                (
                    &r.rule,
                    RoutingCandidate::new(r.rule.target.clone(), r.rule.confidence, Method::Rule),
                )
            })
    }
}

/// Reads every `*.toml` rule file under `dir`, in file-name order. A missing
/// directory yields no rules.
pub fn load_rules_from_dir(dir: &Path) -> anyhow::Result<Vec<Rule>> {
    let mut rules = Vec::new();
    if !dir.exists() {
        return Ok(rules);
    }
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some("toml")
        {
            let content = fs::read_to_string(entry.path())?;
            let rule: Rule = toml::from_str(&content)
                .with_context(|| format!("parsing {}", entry.path().display()))?;
            rules.push(rule);
        }
    }
    Ok(rules)
}

fn rule(name: &str, target: &[&str], confidence: f32, condition: Condition) -> Rule {
    Rule {
        name: name.to_string(),
        enabled: true,
        target: target.iter().map(|s| s.to_string()).collect(),
        confidence,
        condition,
    }
}

fn globs(patterns: &[&str]) -> Condition {
    Condition::Any {
        any: patterns
            .iter()
            .map(|p| Condition::Glob {
                pattern: p.to_string(),
            })
            .collect(),
    }
}

fn tokens(tokens: &[&str]) -> Condition {
    Condition::Any {
        any: tokens
            .iter()
            .map(|t| Condition::Token {
                token: t.to_string(),
            })
            .collect(),
    }
}

fn builtin_rules() -> Vec<Rule> {
    vec![
        rule(
            "fatture",
            &["Amministrativo", "Fatture"],
            0.80,
            globs(&["*fattur*", "*invoice*", "*nota di credito*"]),
        ),
        rule(
            "preventivi",
            &["Amministrativo", "Preventivi"],
            0.75,
            globs(&["*preventiv*", "*offert*", "*quotation*"]),
        ),
        rule(
            "contratti",
            &["Contratti"],
            0.80,
            globs(&["*contratt*", "*contract*", "*incarico*"]),
        ),
        rule(
            "ordini",
            &["Amministrativo", "Ordini"],
            0.70,
            tokens(&["ordine", "ordini", "order", "po"]),
        ),
        rule(
            "estratti-conto",
            &["Contabilita", "Estratti Conto"],
            0.75,
            globs(&["*estratto conto*", "*estratti conto*", "*bank statement*"]),
        ),
        rule(
            "prima-nota",
            &["Contabilita", "Prima Nota"],
            0.70,
            globs(&["*prima nota*"]),
        ),
        rule(
            "verbali",
            &["Cantiere", "Verbali"],
            0.70,
            globs(&["*verbal*", "*sopralluog*"]),
        ),
        rule(
            "sicurezza",
            &["Cantiere", "Sicurezza"],
            0.70,
            Condition::Any {
                any: vec![
                    tokens(&["pos", "psc", "duvri"]),
                    globs(&["*sicurezza*"]),
                ],
            },
        ),
        rule(
            "computi",
            &["Progettazione", "Computi"],
            0.70,
            globs(&["*computo*", "*computi*"]),
        ),
        rule(
            "relazioni",
            &["Progettazione", "Relazioni"],
            0.65,
            globs(&["*relazion*"]),
        ),
        rule(
            "permessi",
            &["Permessi"],
            0.70,
            Condition::Any {
                any: vec![
                    tokens(&["scia", "cila", "dia"]),
                    globs(&["*permesso*", "*autorizzazion*"]),
                ],
            },
        ),
        rule(
            "disegni",
            &["Progettazione", "Disegni"],
            0.70,
            Condition::ExtensionClass {
                class: ExtensionClass::Drawing,
            },
        ),
        rule(
            "foto",
            &["Foto"],
            0.60,
            Condition::ExtensionClass {
                class: ExtensionClass::Image,
            },
        ),
        rule(
            "email",
            &["Corrispondenza"],
            0.65,
            Condition::ExtensionClass {
                class: ExtensionClass::Email,
            },
        ),
    ]
}
