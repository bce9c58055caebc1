// ── Engine: Template Mini-Grammar ──────────────────────────────────────────
//
// Parses a question-template string into a matchable `Pattern`:
//
//   literal words            Open the door
//   alternatives             (Hi | Hello | Good {$time: #TOD})
//   optionals                [pod bay]         door[s]
//   captures                 {$name: #CONCEPT}   {$name: *}
//   concept references       #ARTICLE
//   filler                   ...               (zero or more tokens, anywhere)
//   wildcard                 *                 (rest of utterance, final only)
//
// Suffix groups glued to a word expand into literal form sets:
// `door[s]` → {door, doors}; `Thank('s | you)` → the fused form "thanks" or
// the two-token sequence "thank you". Angle brackets are decoration and are
// stripped. Parsing fails at instance construction, never at match time:
// on unbalanced brackets, a misplaced wildcard, a malformed capture, or a
// reference to a concept the registry does not know.

use crate::atoms::error::{MindError, MindResult};
use crate::atoms::types::normalize_word;
use crate::engine::concepts::ConceptRegistry;

// ── Pattern nodes ──────────────────────────────────────────────────────────

/// Where a capture gets its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// Invoke the named concept's extract function on the candidate span.
    Concept(String),
    /// Unconstrained span of one or more tokens.
    Any,
}

/// One node of a parsed pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Matches one utterance token whose normalized form is in `forms`.
    /// `weight` is the score contribution (0 inside an optional).
    Literal { forms: Vec<String>, weight: u32 },
    /// The sub-pattern may match its full content or nothing at all.
    Optional(Vec<Node>),
    /// Exactly one branch must match.
    Alternation(Vec<Vec<Node>>),
    /// Named binding, extracted during matching.
    Capture { name: String, source: CaptureSource },
    /// Concept must recognize the span; the value is discarded.
    ConceptRef(String),
    /// Zero or more tokens, anywhere in the pattern.
    Ellipsis,
    /// All remaining tokens; only valid as the final element.
    Wildcard,
}

/// A parsed question template.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub(crate) nodes: Vec<Node>,
    source: String,
}

impl Pattern {
    /// Parse a template string against a concept registry.
    pub fn parse(src: &str, concepts: &ConceptRegistry) -> MindResult<Pattern> {
        let chars: Vec<char> = src.chars().collect();
        let elems = scan(&chars, src)?;
        let nodes = compile_seq(&elems, concepts, src)?;
        if nodes.is_empty() {
            return Err(MindError::grammar(src, "template has no tokens"));
        }
        check_wildcard_position(&nodes, true, src)?;
        Ok(Pattern { nodes, source: src.to_string() })
    }

    /// The original template string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True for catch-all templates (wildcards and unconstrained captures
    /// only). These are tried last and can never score.
    pub fn is_fallback(&self) -> bool {
        fn anchored(nodes: &[Node]) -> bool {
            nodes.iter().any(|n| match n {
                Node::Literal { .. } | Node::ConceptRef(_) => true,
                Node::Capture { source: CaptureSource::Concept(_), .. } => true,
                Node::Capture { source: CaptureSource::Any, .. } => false,
                Node::Optional(sub) => anchored(sub),
                Node::Alternation(branches) => branches.iter().any(|b| anchored(b)),
                Node::Ellipsis | Node::Wildcard => false,
            })
        }
        !anchored(&self.nodes)
    }
}

// ── Scanner ────────────────────────────────────────────────────────────────
// First pass: the raw element stream, whitespace preserved as `Break` so the
// compiler can tell glued suffixes (`door[s]`) from spaced groups.

#[derive(Debug, Clone, PartialEq)]
enum Elem {
    Text(String),
    Group(Vec<Vec<Elem>>),
    Opt(Vec<Elem>),
    Capture { name: String, source: CaptureSource },
    Ref(String),
    Wild,
    Break,
}

fn scan(chars: &[char], template: &str) -> MindResult<Vec<Elem>> {
    let mut elems: Vec<Elem> = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    fn flush(text: &mut String, elems: &mut Vec<Elem>) {
        if !text.is_empty() {
            elems.push(Elem::Text(std::mem::take(text)));
        }
    }

    while i < chars.len() {
        let c = chars[i];
        match c {
            _ if c.is_whitespace() => {
                flush(&mut text, &mut elems);
                if elems.last() != Some(&Elem::Break) && !elems.is_empty() {
                    elems.push(Elem::Break);
                }
                i += 1;
            }
            '(' => {
                flush(&mut text, &mut elems);
                let end = matching(chars, i, '(', ')')
                    .ok_or_else(|| MindError::grammar(template, "unbalanced '('"))?;
                let inner = &chars[i + 1..end];
                let branches = split_alternatives(inner)
                    .into_iter()
                    .map(|b| scan(&b, template).map(trim_breaks))
                    .collect::<MindResult<Vec<_>>>()?;
                elems.push(Elem::Group(branches));
                i = end + 1;
            }
            '[' => {
                flush(&mut text, &mut elems);
                let end = matching(chars, i, '[', ']')
                    .ok_or_else(|| MindError::grammar(template, "unbalanced '['"))?;
                let inner = scan(&chars[i + 1..end], template)?;
                elems.push(Elem::Opt(trim_breaks(inner)));
                i = end + 1;
            }
            '{' => {
                flush(&mut text, &mut elems);
                let end = matching(chars, i, '{', '}')
                    .ok_or_else(|| MindError::grammar(template, "unbalanced '{'"))?;
                let inner: String = chars[i + 1..end].iter().collect();
                elems.push(parse_capture(&inner, template)?);
                i = end + 1;
            }
            '#' => {
                flush(&mut text, &mut elems);
                let name = read_name(chars, i + 1);
                if name.is_empty() {
                    return Err(MindError::grammar(template, "'#' without a concept name"));
                }
                i += 1 + name.chars().count();
                elems.push(Elem::Ref(name));
            }
            '*' => {
                flush(&mut text, &mut elems);
                elems.push(Elem::Wild);
                i += 1;
            }
            // Decoration only; `[<#ADJECTIVE>]` reads like `[#ADJECTIVE]`.
            '<' | '>' => i += 1,
            ')' | ']' | '}' => {
                return Err(MindError::grammar(template, format!("unbalanced '{c}'")));
            }
            '|' => {
                return Err(MindError::grammar(template, "'|' outside a group"));
            }
            _ => {
                text.push(c);
                i += 1;
            }
        }
    }
    flush(&mut text, &mut elems);
    while elems.last() == Some(&Elem::Break) {
        elems.pop();
    }
    Ok(elems)
}

/// Index of the closing delimiter matching the opener at `start`.
fn matching(chars: &[char], start: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate().skip(start) {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split group content on top-level `|` only.
fn split_alternatives(chars: &[char]) -> Vec<Vec<char>> {
    let mut branches = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0i32;
    for &c in chars {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            '|' if depth == 0 => branches.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    branches.push(current);
    branches
}

fn trim_breaks(mut elems: Vec<Elem>) -> Vec<Elem> {
    while elems.first() == Some(&Elem::Break) {
        elems.remove(0);
    }
    while elems.last() == Some(&Elem::Break) {
        elems.pop();
    }
    elems
}

/// `$name: #CONCEPT` or `$name: *` between capture braces.
fn parse_capture(inner: &str, template: &str) -> MindResult<Elem> {
    let inner = inner.trim();
    let rest = inner
        .strip_prefix('$')
        .ok_or_else(|| MindError::grammar(template, "capture must start with '$'"))?;
    let (name, source) = rest
        .split_once(':')
        .ok_or_else(|| MindError::grammar(template, "capture needs '$name: source'"))?;
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(MindError::grammar(template, format!("bad capture name {name:?}")));
    }
    let source = source.trim();
    let source = if source == "*" {
        CaptureSource::Any
    } else if let Some(concept) = source.strip_prefix('#') {
        if concept.is_empty() {
            return Err(MindError::grammar(template, "capture concept name is empty"));
        }
        CaptureSource::Concept(concept.to_string())
    } else {
        return Err(MindError::grammar(
            template,
            format!("capture source must be '*' or '#CONCEPT', got {source:?}"),
        ));
    };
    Ok(Elem::Capture { name: name.to_string(), source })
}

fn read_name(chars: &[char], from: usize) -> String {
    chars[from..]
        .iter()
        .take_while(|c| c.is_alphanumeric() || **c == '_')
        .collect()
}

// ── Compiler ───────────────────────────────────────────────────────────────
// Second pass: element stream → pattern nodes. Chunks are glued runs between
// whitespace breaks; textual chunks expand into literal form sets.

fn compile_seq(elems: &[Elem], reg: &ConceptRegistry, template: &str) -> MindResult<Vec<Node>> {
    let mut nodes = Vec::new();
    for chunk in elems.split(|e| *e == Elem::Break) {
        if !chunk.is_empty() {
            nodes.extend(compile_chunk(chunk, reg, template)?);
        }
    }
    Ok(nodes)
}

fn compile_chunk(chunk: &[Elem], reg: &ConceptRegistry, template: &str) -> MindResult<Vec<Node>> {
    // Single-element chunks keep their structure.
    if chunk.len() == 1 {
        return compile_elem(&chunk[0], reg, template);
    }
    // Glued textual run: expand into word-form sequences.
    if let Some(seqs) = try_expand_forms(chunk) {
        return Ok(forms_to_nodes(seqs));
    }
    // Mixed run (e.g. a capture glued to punctuation): compile each element.
    let mut nodes = Vec::new();
    for e in chunk {
        nodes.extend(compile_elem(e, reg, template)?);
    }
    Ok(nodes)
}

fn compile_elem(e: &Elem, reg: &ConceptRegistry, template: &str) -> MindResult<Vec<Node>> {
    Ok(match e {
        Elem::Text(t) if is_dots(t) => vec![Node::Ellipsis],
        Elem::Text(t) => {
            let form = normalize_word(t);
            if form.is_empty() {
                vec![] // bare punctuation contributes nothing
            } else {
                vec![Node::Literal { forms: vec![form], weight: 1 }]
            }
        }
        Elem::Opt(inner) => {
            let mut sub = compile_seq(inner, reg, template)?;
            if sub.is_empty() {
                vec![]
            } else {
                zero_weights(&mut sub);
                vec![Node::Optional(sub)]
            }
        }
        Elem::Group(branches) => {
            let compiled = branches
                .iter()
                .map(|b| compile_seq(b, reg, template))
                .collect::<MindResult<Vec<_>>>()?;
            vec![Node::Alternation(compiled)]
        }
        Elem::Capture { name, source } => {
            if let CaptureSource::Concept(c) = source {
                require_concept(c, reg, template)?;
            }
            vec![Node::Capture { name: name.clone(), source: source.clone() }]
        }
        Elem::Ref(name) => {
            require_concept(name, reg, template)?;
            vec![Node::ConceptRef(name.clone())]
        }
        Elem::Wild => vec![Node::Wildcard],
        Elem::Break => vec![],
    })
}

fn require_concept(name: &str, reg: &ConceptRegistry, template: &str) -> MindResult<()> {
    if reg.contains(name) {
        Ok(())
    } else {
        Err(MindError::grammar(template, format!("unknown concept #{name}")))
    }
}

fn is_dots(t: &str) -> bool {
    t.len() >= 2 && t.chars().all(|c| c == '.')
}

/// Expand a glued textual run into the set of word sequences it can produce.
/// Returns `None` when the run contains anything non-textual.
fn try_expand_forms(elems: &[Elem]) -> Option<Vec<Vec<String>>> {
    let mut seqs: Vec<Vec<String>> = vec![vec![]];
    for e in elems {
        match e {
            Elem::Text(t) if !is_dots(t) => {
                for s in &mut seqs {
                    glue_word(s, t);
                }
            }
            Elem::Opt(inner) => {
                let inner_seqs = expand_sub(inner)?;
                let mut out = seqs.clone();
                for s in &seqs {
                    for b in &inner_seqs {
                        out.push(concat_glue(s, b, true));
                    }
                }
                seqs = out;
            }
            Elem::Group(branches) => {
                let mut out = Vec::new();
                for s in &seqs {
                    for br in branches {
                        for b in expand_sub(br)? {
                            // An apostrophe-led branch fuses onto the word
                            // (`Thank('s|…)` → "thanks"); a word-led branch
                            // stands alone ("thank you").
                            let fuse = b
                                .first()
                                .and_then(|w| w.chars().next())
                                .map(|c| !c.is_alphanumeric())
                                .unwrap_or(false);
                            out.push(concat_glue(s, &b, fuse));
                        }
                    }
                }
                seqs = out;
            }
            _ => return None,
        }
    }
    Some(seqs)
}

/// Expand a sub-sequence (may contain breaks) into word sequences.
fn expand_sub(elems: &[Elem]) -> Option<Vec<Vec<String>>> {
    let mut seqs: Vec<Vec<String>> = vec![vec![]];
    for chunk in elems.split(|e| *e == Elem::Break) {
        if chunk.is_empty() {
            continue;
        }
        let chunk_seqs = try_expand_forms(chunk)?;
        let mut out = Vec::new();
        for s in &seqs {
            for c in &chunk_seqs {
                let mut joined = s.clone();
                joined.extend(c.iter().cloned());
                out.push(joined);
            }
        }
        seqs = out;
    }
    Some(seqs)
}

/// Append raw text to the tail word of a sequence (glued continuation).
fn glue_word(seq: &mut Vec<String>, text: &str) {
    match seq.last_mut() {
        Some(last) => last.push_str(text),
        None => seq.push(text.to_string()),
    }
}

fn concat_glue(base: &[String], branch: &[String], fuse_first: bool) -> Vec<String> {
    let mut out = base.to_vec();
    for (i, w) in branch.iter().enumerate() {
        if i == 0 && fuse_first && !out.is_empty() {
            glue_word(&mut out, w);
        } else {
            out.push(w.clone());
        }
    }
    out
}

/// Word-form sequences → a literal node (all single words) or an
/// alternation over literal sequences.
fn forms_to_nodes(seqs: Vec<Vec<String>>) -> Vec<Node> {
    let mut normalized: Vec<Vec<String>> = Vec::new();
    for seq in seqs {
        let words: Vec<String> = seq
            .iter()
            .map(|w| normalize_word(w))
            .filter(|w| !w.is_empty())
            .collect();
        if !words.is_empty() && !normalized.contains(&words) {
            normalized.push(words);
        }
    }
    if normalized.is_empty() {
        return vec![];
    }
    if normalized.iter().all(|s| s.len() == 1) {
        let forms: Vec<String> = normalized.into_iter().map(|mut s| s.remove(0)).collect();
        return vec![Node::Literal { forms, weight: 1 }];
    }
    let branches = normalized
        .into_iter()
        .map(|seq| {
            seq.into_iter()
                .map(|w| Node::Literal { forms: vec![w], weight: 1 })
                .collect()
        })
        .collect();
    vec![Node::Alternation(branches)]
}

/// Literal tokens absorbed by an optional never score.
fn zero_weights(nodes: &mut [Node]) {
    for n in nodes {
        match n {
            Node::Literal { weight, .. } => *weight = 0,
            Node::Optional(sub) => zero_weights(sub),
            Node::Alternation(branches) => {
                for b in branches {
                    zero_weights(b);
                }
            }
            _ => {}
        }
    }
}

fn check_wildcard_position(nodes: &[Node], top: bool, template: &str) -> MindResult<()> {
    let last = nodes.len().saturating_sub(1);
    for (i, n) in nodes.iter().enumerate() {
        match n {
            Node::Wildcard if !top || i != last => {
                return Err(MindError::grammar(
                    template,
                    "wildcard '*' is only valid as the final element",
                ));
            }
            Node::Optional(sub) => check_wildcard_position(sub, false, template)?,
            Node::Alternation(branches) => {
                for b in branches {
                    check_wildcard_position(b, false, template)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}
