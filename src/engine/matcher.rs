// ── Engine: Matcher ────────────────────────────────────────────────────────
//
// Scores an utterance's tokens against a parsed pattern, extracting bound
// variable values on success. Walks tokens and pattern nodes in lock-step;
// captures, concept refs and fillers resolve to the *shortest* span that
// still lets the rest of the pattern match (the tie-break for ambiguous
// spans). Scoring is literal-only: +1 per required literal token, nothing
// for absorbed optional/capture/wildcard tokens, so a wildcard-heavy
// template can never out-compete a specific one.

use crate::atoms::types::{MatchResult, Token};
use crate::engine::concepts::ConceptRegistry;
use crate::engine::grammar::{CaptureSource, Node, Pattern};
use crate::engine::tokenizer::span_text;

/// Match an utterance against one pattern. `None` is a failed match,
/// distinct from a successful zero-score match.
pub fn match_pattern(
    pattern: &Pattern,
    tokens: &[Token],
    concepts: &ConceptRegistry,
) -> Option<MatchResult> {
    match_seq(&pattern.nodes, tokens, concepts)
}

fn match_seq(nodes: &[Node], toks: &[Token], reg: &ConceptRegistry) -> Option<MatchResult> {
    let Some((node, rest)) = nodes.split_first() else {
        return toks.is_empty().then(MatchResult::default);
    };

    match node {
        Node::Literal { forms, weight } => {
            let tok = toks.first()?;
            if !forms.iter().any(|f| *f == tok.norm) {
                return None;
            }
            let mut m = match_seq(rest, &toks[1..], reg)?;
            m.score += weight;
            Some(m)
        }

        Node::Optional(sub) => {
            // Greedy: take the optional content if it fits, skip otherwise.
            match_seq(&concat(sub, rest), toks, reg).or_else(|| match_seq(rest, toks, reg))
        }

        Node::Alternation(branches) => branches
            .iter()
            .find_map(|b| match_seq(&concat(b, rest), toks, reg)),

        Node::Capture { name, source: CaptureSource::Any } => {
            // Shortest unconstrained span (one or more tokens) that leaves a
            // matchable remainder.
            (1..=toks.len()).find_map(|len| {
                let mut m = match_seq(rest, &toks[len..], reg)?;
                m.bindings.insert(name.clone(), span_text(&toks[..len]));
                Some(m)
            })
        }

        Node::Capture { name, source: CaptureSource::Concept(concept) } => {
            (1..=toks.len()).find_map(|len| {
                let value = reg.extract(concept, &span_text(&toks[..len]))?;
                let mut m = match_seq(rest, &toks[len..], reg)?;
                m.bindings.insert(name.clone(), value);
                Some(m)
            })
        }

        Node::ConceptRef(concept) => (1..=toks.len()).find_map(|len| {
            reg.extract(concept, &span_text(&toks[..len]))?;
            match_seq(rest, &toks[len..], reg)
        }),

        Node::Ellipsis => {
            (0..=toks.len()).find_map(|len| match_seq(rest, &toks[len..], reg))
        }

        // Grammar guarantees this is the final element.
        Node::Wildcard => Some(MatchResult::default()),
    }
}

fn concat(a: &[Node], b: &[Node]) -> Vec<Node> {
    a.iter().chain(b).cloned().collect()
}

/// Select the best-matching pattern from an ordered candidate list.
///
/// Non-fallback patterns are tried in declaration order; the highest score
/// wins and earlier declaration breaks ties. Fallback (wildcard-only)
/// patterns are tried last and only selected when no other pattern produces
/// a nonzero-score match. Returns the candidate index and its match.
pub fn select_best(
    patterns: &[&Pattern],
    tokens: &[Token],
    concepts: &ConceptRegistry,
) -> Option<(usize, MatchResult)> {
    let mut best: Option<(usize, MatchResult)> = None;
    for (i, p) in patterns.iter().enumerate() {
        if p.is_fallback() {
            continue;
        }
        if let Some(m) = match_pattern(p, tokens, concepts) {
            let better = match &best {
                Some((_, b)) => m.score > b.score,
                None => true,
            };
            if better {
                best = Some((i, m));
            }
        }
    }

    if matches!(&best, Some((_, m)) if m.score > 0) {
        return best;
    }

    // No nonzero match, so the catch-all gets its turn.
    let fallback = patterns
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_fallback())
        .find_map(|(i, p)| match_pattern(p, tokens, concepts).map(|m| (i, m)));

    fallback.or(best)
}
