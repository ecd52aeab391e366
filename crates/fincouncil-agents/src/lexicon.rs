//! Word and clause scanning plus the keyword tables used to read stances,
//! topics and query relevance out of free-form advice.

use std::collections::BTreeSet;

use fincouncil_models::agent_message::Stance;
use rust_decimal::Decimal;

/// A lowercase word and its byte offset in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Word {
    pub offset: usize,
    pub text: String,
}

pub(crate) fn words(text: &str) -> Vec<Word> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        let continues = start.is_some() && (c == '\'' || c == '’');
        if c.is_alphabetic() || continues {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            out.push(Word {
                offset: s,
                text: normalize_word(&text[s..i]),
            });
        }
    }
    if let Some(s) = start {
        out.push(Word {
            offset: s,
            text: normalize_word(&text[s..]),
        });
    }
    out
}

fn normalize_word(raw: &str) -> String {
    raw.to_lowercase()
        .replace('’', "'")
        .trim_end_matches('\'')
        .to_string()
}

const ABBREVIATIONS: &[&str] = &["rs", "vs", "approx", "e.g", "i.e"];

fn follows_abbreviation(text: &str, dot: usize) -> bool {
    let before = &text[..dot];
    let word_start = before
        .char_indices()
        .rev()
        .find(|&(_, c)| !(c.is_alphabetic() || c == '.'))
        .map_or(0, |(i, c)| i + c.len_utf8());
    let word = before[word_start..].to_lowercase();
    ABBREVIATIONS.contains(&word.as_str())
}

fn followed_by_space(text: &str, i: usize, c: char) -> bool {
    text[i + c.len_utf8()..]
        .chars()
        .next()
        .map_or(true, char::is_whitespace)
}

/// Clause delimiters: newlines, and `. , ; : ! ?` followed by whitespace.
/// Grouping commas (`1,00,000`) and decimal points are not delimiters.
fn is_clause_boundary(text: &str, i: usize, c: char) -> bool {
    match c {
        '\n' => true,
        '.' => followed_by_space(text, i, c) && !follows_abbreviation(text, i),
        ',' | ';' | ':' | '!' | '?' => followed_by_space(text, i, c),
        _ => false,
    }
}

fn is_sentence_boundary(text: &str, i: usize, c: char) -> bool {
    match c {
        '\n' => true,
        '.' => followed_by_space(text, i, c) && !follows_abbreviation(text, i),
        '!' | '?' => followed_by_space(text, i, c),
        _ => false,
    }
}

fn split_spans(text: &str, boundary: fn(&str, usize, char) -> bool) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if boundary(text, i, c) {
            push_trimmed(text, start, i, &mut spans);
            start = i + c.len_utf8();
        }
    }
    push_trimmed(text, start, text.len(), &mut spans);
    spans
}

fn push_trimmed(text: &str, start: usize, end: usize, spans: &mut Vec<(usize, usize)>) {
    let slice = &text[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim();
    if !trimmed.is_empty() {
        spans.push((start + lead, start + lead + trimmed.len()));
    }
}

/// Byte spans of the non-blank clauses of `text`, in reading order.
pub(crate) fn clause_spans(text: &str) -> Vec<(usize, usize)> {
    split_spans(text, is_clause_boundary)
}

/// Byte spans of the non-blank sentences of `text`, in reading order.
pub(crate) fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    split_spans(text, is_sentence_boundary)
}

/// The clause that contains `[start, end)`. Delimiters inside the span are ignored.
pub(crate) fn enclosing_clause(text: &str, start: usize, end: usize) -> (usize, usize) {
    let mut clause_start = 0;
    for (i, c) in text[..start].char_indices() {
        if is_clause_boundary(text, i, c) {
            clause_start = i + c.len_utf8();
        }
    }
    let mut clause_end = text.len();
    for (i, c) in text[end..].char_indices() {
        if is_clause_boundary(text, end + i, c) {
            clause_end = end + i;
            break;
        }
    }
    let clause = &text[clause_start..clause_end];
    let lead = clause.len() - clause.trim_start().len();
    let trail = clause.len() - clause.trim_end().len();
    (clause_start + lead, (clause_end - trail).max(clause_start + lead))
}

pub(crate) fn is_action_verb(word: &str) -> bool {
    matches!(
        word,
        "allocate"
            | "allocated"
            | "allocating"
            | "allocation"
            | "invest"
            | "invested"
            | "investing"
            | "pay"
            | "paying"
            | "paid"
            | "repay"
            | "repaying"
            | "prepay"
            | "save"
            | "saving"
            | "saved"
            | "budget"
            | "budgeting"
            | "budgeted"
            | "use"
            | "using"
            | "put"
            | "putting"
            | "spend"
            | "spending"
            | "clear"
            | "clearing"
            | "park"
            | "parking"
            | "deploy"
            | "contribute"
            | "contributing"
            | "set"
            | "keep"
            | "earmark"
            | "direct"
            | "transfer"
            | "buy"
    )
}

fn is_invest_word(word: &str) -> bool {
    matches!(
        word,
        "invest"
            | "invests"
            | "invested"
            | "investing"
            | "investment"
            | "investments"
            | "equity"
            | "equities"
            | "stock"
            | "stocks"
            | "shares"
            | "sip"
            | "sips"
            | "etf"
            | "etfs"
            | "mutual"
            | "index"
    )
}

fn is_preserve_word(word: &str) -> bool {
    matches!(
        word,
        "save"
            | "saves"
            | "saved"
            | "saving"
            | "savings"
            | "emergency"
            | "insurance"
            | "insure"
            | "deposit"
            | "deposits"
            | "fd"
            | "liquid"
            | "liquidity"
            | "cushion"
            | "buffer"
            | "protect"
            | "protection"
            | "reserve"
            | "aside"
    )
}

fn is_spend_word(word: &str) -> bool {
    matches!(
        word,
        "buy" | "buying" | "purchase" | "purchasing" | "spend" | "spending" | "splurge" | "upgrade"
    )
}

fn is_repay_word(word: &str) -> bool {
    matches!(
        word,
        "repay"
            | "repays"
            | "repaid"
            | "repaying"
            | "repayment"
            | "prepay"
            | "prepaying"
            | "prepayment"
            | "deleverage"
    )
}

fn is_debt_verb(word: &str) -> bool {
    matches!(
        word,
        "pay"
            | "pays"
            | "paying"
            | "paid"
            | "clear"
            | "clears"
            | "clearing"
            | "cleared"
            | "close"
            | "closing"
            | "reduce"
            | "reducing"
            | "settle"
            | "settling"
            | "eliminate"
            | "eliminating"
    )
}

fn is_debt_noun(word: &str) -> bool {
    matches!(
        word,
        "debt"
            | "debts"
            | "loan"
            | "loans"
            | "emi"
            | "emis"
            | "dues"
            | "borrowing"
            | "borrowings"
            | "mortgage"
            | "overdraft"
            | "credit"
    )
}

fn is_negator(word: &str) -> bool {
    matches!(
        word,
        "not"
            | "don't"
            | "dont"
            | "never"
            | "avoid"
            | "avoiding"
            | "instead"
            | "rather"
            | "than"
            | "before"
            | "skip"
            | "postpone"
            | "delay"
            | "delaying"
            | "without"
    )
}

fn is_priority_marker(word: &str) -> bool {
    matches!(
        word,
        "first"
            | "priority"
            | "prioritise"
            | "prioritize"
            | "prioritising"
            | "prioritizing"
            | "immediately"
            | "urgent"
            | "urgently"
            | "before"
            | "asap"
    )
}

/// A negator up to two words before a keyword cancels it ("don't invest",
/// "rather than investing", "before investing").
const NEGATION_REACH: usize = 2;

fn negated(words: &[Word], idx: usize) -> bool {
    words[idx.saturating_sub(NEGATION_REACH)..idx]
        .iter()
        .any(|w| is_negator(&w.text))
}

/// Non-negated stance mentions in one clause, in reading order.
pub(crate) fn clause_stances(words: &[Word]) -> Vec<Stance> {
    let has_debt_noun = words.iter().any(|w| is_debt_noun(&w.text));
    let has_debt_verb = words.iter().any(|w| is_debt_verb(&w.text));
    let has_action = words.iter().any(|w| is_action_verb(&w.text));

    let mut stances = Vec::new();
    for (idx, word) in words.iter().enumerate() {
        let w = word.text.as_str();
        let stance = if is_repay_word(w) || (is_debt_verb(w) && has_debt_noun) {
            Some(Stance::ReduceDebt)
        } else if is_debt_noun(w) && has_action && !has_debt_verb {
            // "use ₹75,000 for debt"
            Some(Stance::ReduceDebt)
        } else if is_invest_word(w) {
            Some(Stance::Invest)
        } else if is_spend_word(w) {
            Some(Stance::Spend)
        } else if is_preserve_word(w) {
            Some(Stance::Preserve)
        } else {
            None
        };

        if let Some(stance) = stance {
            if !negated(words, idx) && stances.last() != Some(&stance) {
                stances.push(stance);
            }
        }
    }
    stances
}

/// Directional reading of one agent's text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct StanceProfile {
    /// First non-negated stance in reading order.
    pub primary: Option<Stance>,
    pub mentioned: BTreeSet<Stance>,
    /// Stance of the first clause carrying a priority marker ("first", "before", ...).
    pub leading_priority: Option<Stance>,
}

pub(crate) fn stance_profile(text: &str) -> StanceProfile {
    let mut profile = StanceProfile::default();
    for (start, end) in clause_spans(text) {
        let clause_words = words(&text[start..end]);
        let stances = clause_stances(&clause_words);
        let Some(&first) = stances.first() else {
            continue;
        };
        profile.primary.get_or_insert(first);
        profile.mentioned.extend(stances.iter().copied());
        if profile.leading_priority.is_none()
            && clause_words.iter().any(|w| is_priority_marker(&w.text))
        {
            profile.leading_priority = Some(first);
        }
    }
    profile
}

/// Coarse subject areas, used to decide whether two answers talk about the same thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Topic {
    Debt,
    Windfall,
    Vehicle,
    Housing,
    Retirement,
    Education,
    Emergency,
    Tax,
    Insurance,
    Wedding,
    Travel,
}

pub(crate) fn topic_of(word: &str) -> Option<Topic> {
    let topic = match word {
        "debt" | "debts" | "loan" | "loans" | "emi" | "emis" | "credit" | "borrowing" | "dues"
        | "overdraft" => Topic::Debt,
        "bonus" | "bonuses" | "windfall" | "inheritance" | "lump" | "lumpsum" => Topic::Windfall,
        "car" | "cars" | "vehicle" | "vehicles" | "automobile" | "bike" | "scooter" => {
            Topic::Vehicle
        }
        "house" | "home" | "flat" | "apartment" | "property" | "mortgage" | "rent" => {
            Topic::Housing
        }
        "retirement" | "retire" | "retiring" | "pension" | "nps" | "ppf" => Topic::Retirement,
        "education" | "college" | "tuition" | "school" | "university" => Topic::Education,
        "emergency" => Topic::Emergency,
        "tax" | "taxes" | "taxation" => Topic::Tax,
        "insurance" | "insure" | "premium" | "cover" => Topic::Insurance,
        "wedding" | "marriage" => Topic::Wedding,
        "travel" | "vacation" | "holiday" | "trip" => Topic::Travel,
        _ => return None,
    };
    Some(topic)
}

pub(crate) fn topics(text: &str) -> BTreeSet<Topic> {
    words(text)
        .iter()
        .filter_map(|w| topic_of(&w.text))
        .collect()
}

fn is_stopword(word: &str) -> bool {
    matches!(
        word,
        "the"
            | "and"
            | "for"
            | "what"
            | "what's"
            | "how"
            | "much"
            | "many"
            | "should"
            | "could"
            | "would"
            | "will"
            | "can"
            | "with"
            | "this"
            | "that"
            | "these"
            | "those"
            | "your"
            | "you"
            | "mine"
            | "our"
            | "are"
            | "was"
            | "were"
            | "have"
            | "has"
            | "had"
            | "get"
            | "got"
            | "need"
            | "want"
            | "best"
            | "way"
            | "now"
            | "some"
            | "any"
            | "about"
            | "from"
            | "into"
            | "which"
            | "when"
            | "where"
            | "who"
            | "why"
            | "does"
            | "did"
            | "doing"
            | "there"
            | "their"
            | "them"
            | "then"
            | "than"
            | "also"
            | "just"
            | "more"
            | "most"
            | "very"
            | "really"
            | "please"
            | "tell"
            | "give"
            | "advice"
            | "suggest"
            | "recommend"
            | "money"
            | "rupees"
            | "inr"
    )
}

fn stem(word: &str) -> String {
    let len = word.chars().count();
    if len > 5 && word.ends_with("ing") {
        word[..word.len() - 3].to_string()
    } else if len > 4 && word.ends_with("ed") {
        word[..word.len() - 2].to_string()
    } else if len > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Content-bearing terms of `text`, canonicalized so synonyms ("car"/"vehicle")
/// and inflections ("investing"/"invest") compare equal.
pub(crate) fn salient_terms(text: &str) -> BTreeSet<String> {
    words(text)
        .iter()
        .filter(|w| w.text.chars().count() >= 3 && !is_stopword(&w.text))
        .map(|w| match topic_of(&w.text) {
            Some(topic) => format!("#{topic:?}"),
            None => stem(&w.text),
        })
        .collect()
}

/// Format an amount with Indian digit grouping, e.g. `₹1,00,000`.
pub(crate) fn format_amount(symbol: &str, amount: Decimal) -> String {
    let rendered = amount.round_dp(2).normalize().to_string();
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (rendered, None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let grouped = if digits.len() <= 3 {
        int_part.clone()
    } else {
        let (head, tail) = digits.split_at(digits.len() - 3);
        let mut groups: Vec<String> = head
            .rchunks(2)
            .map(|chunk| chunk.iter().collect())
            .collect();
        groups.reverse();
        groups.push(tail.iter().collect());
        groups.join(",")
    };

    match frac_part {
        Some(frac) => format!("{symbol}{grouped}.{frac}"),
        None => format!("{symbol}{grouped}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn clauses(text: &str) -> Vec<&str> {
        clause_spans(text).into_iter().map(|(s, e)| &text[s..e]).collect()
    }

    #[test]
    fn clause_split_keeps_grouped_numbers_together() {
        assert_eq!(
            clauses("Clear ₹75,000 debt, save ₹25,000. Then relax."),
            vec!["Clear ₹75,000 debt", "save ₹25,000", "Then relax"]
        );
    }

    #[test]
    fn clause_split_ignores_currency_abbreviation() {
        assert_eq!(
            clauses("Keep Rs. 5000 aside; invest 2.5 lakh rupees."),
            vec!["Keep Rs. 5000 aside", "invest 2.5 lakh rupees"]
        );
    }

    #[test]
    fn enclosing_clause_spans_the_figure() {
        let text = "Of your ₹1,00,000 bonus, use ₹75,000 for debt.";
        let start = text.find("₹75,000").unwrap();
        let (s, e) = enclosing_clause(text, start, start + "₹75,000".len());
        assert_eq!(&text[s..e], "use ₹75,000 for debt");
    }

    #[test]
    fn enclosing_clause_agrees_with_clause_spans() {
        let text = "Keep ₹20,000 aside;  invest ₹50,000 monthly ,\nthen review.";
        let start = text.find("₹50,000").unwrap();
        let span = enclosing_clause(text, start, start + "₹50,000".len());
        assert!(clause_spans(text).contains(&span));
        assert_eq!(&text[span.0..span.1], "invest ₹50,000 monthly");
    }

    #[test]
    fn multibyte_punctuation_before_a_full_stop() {
        let text = "Pay off the ₹75,000 loan—quickly. Then invest “wisely”. Done.";
        assert_eq!(
            clauses(text),
            vec!["Pay off the ₹75,000 loan—quickly", "Then invest “wisely”", "Done"]
        );
        assert_eq!(sentence_spans(text).len(), 3);
        assert!(follows_abbreviation("—Rs. 500", "—Rs".len()));
    }

    #[test]
    fn words_are_lowercased_with_offsets() {
        let ws = words("Don't INVEST now");
        assert_eq!(ws[0].text, "don't");
        assert_eq!(ws[1].text, "invest");
        assert_eq!(ws[1].offset, 6);
    }

    #[test]
    fn negation_cancels_a_stance() {
        let profile = stance_profile("Pay off the credit card debt before investing anything.");
        assert_eq!(profile.primary, Some(Stance::ReduceDebt));
        assert!(!profile.mentioned.contains(&Stance::Invest));
        assert_eq!(profile.leading_priority, Some(Stance::ReduceDebt));
    }

    #[test]
    fn primary_stance_is_first_action() {
        let profile = stance_profile("Clear ₹75,000 debt, invest ₹25,000 in equity.");
        assert_eq!(profile.primary, Some(Stance::ReduceDebt));
        assert!(profile.mentioned.contains(&Stance::Invest));
        assert_eq!(profile.leading_priority, None);
    }

    #[test]
    fn debt_noun_with_generic_action_counts_as_repayment() {
        let profile = stance_profile("Use ₹75,000 for debt.");
        assert_eq!(profile.primary, Some(Stance::ReduceDebt));
    }

    #[test]
    fn leading_priority_comes_from_marked_clause() {
        let profile =
            stance_profile("Build an emergency fund first, then pay off the personal loan.");
        assert_eq!(profile.leading_priority, Some(Stance::Preserve));
        assert_eq!(profile.primary, Some(Stance::Preserve));
    }

    #[test]
    fn topics_and_salient_terms() {
        assert!(topics("What is my budget for a car?").contains(&Topic::Vehicle));
        let terms = salient_terms("What is my budget for a car?");
        assert!(terms.contains("budget"));
        assert!(terms.contains("#Vehicle"));
        assert!(!terms.contains("what"));
        assert!(salient_terms("vehicle budgeting").is_superset(&terms));
    }

    #[test]
    fn indian_grouping() {
        assert_eq!(format_amount("₹", dec!(100000)), "₹1,00,000");
        assert_eq!(format_amount("₹", dec!(75000)), "₹75,000");
        assert_eq!(format_amount("₹", dec!(25000000)), "₹2,50,00,000");
        assert_eq!(format_amount("₹", dec!(950)), "₹950");
        assert_eq!(format_amount("₹", dec!(2500.50)), "₹2,500.5");
    }
}
