// ── Engine: Answer Renderer ────────────────────────────────────────────────
//
// Expands an answer template into a final spoken string:
//
//   alternatives      You're welcome! | No problem[o]!     (random pick)
//   optionals         problem[o]                           (coin flip)
//   variables         $insult                              (bound at match)
//   emotions          %SAD(I'm afraid I can't do that)     (prosody span)
//   actions           !SMS($person, $message)              (side effect, no text)
//   generation        #JOKE                                (concept generate)
//   navigation        <- / <--                             (stripped, reported)
//   pause             ...                                  (stripped)
//
// Rendering is pure apart from action side effects, which run to completion
// before the final string is returned. Alternative selection happens at
// render time, not match time; that is where response variety comes from.

use crate::atoms::error::{MindError, MindResult};
use crate::atoms::types::{Directive, EmotionParams, ProsodySpan, Rendered};
use crate::engine::concepts::ConceptRegistry;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

// ── Emotion & action tables ────────────────────────────────────────────────

/// Emotion transform: rendered segment text → prosody adjustment.
pub type EmotionFn = Arc<dyn Fn(&str) -> EmotionParams + Send + Sync>;
pub type EmotionTable = HashMap<String, EmotionFn>;

/// Side-effecting external function invoked by `!NAME(args)` markers.
/// The engine guarantees the documented argument contract and nothing about
/// observable effects.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn invoke(&self, args: Vec<String>) -> MindResult<()>;
}

pub type ActionTable = HashMap<String, Arc<dyn ActionHandler>>;

/// Adapter for synchronous fire-and-forget action closures.
pub struct FnAction<F>(pub F);

#[async_trait]
impl<F> ActionHandler for FnAction<F>
where
    F: Fn(Vec<String>) + Send + Sync,
{
    async fn invoke(&self, args: Vec<String>) -> MindResult<()> {
        (self.0)(args);
        Ok(())
    }
}

/// Everything a render pass needs to resolve markers.
pub struct RenderContext<'a> {
    pub bindings: &'a HashMap<String, String>,
    pub concepts: &'a ConceptRegistry,
    pub emotions: &'a EmotionTable,
    pub actions: &'a ActionTable,
}

// ── Entry point ────────────────────────────────────────────────────────────

/// Render an answer template with the given bound values.
pub async fn render(template: &str, ctx: &RenderContext<'_>) -> MindResult<Rendered> {
    let (body, directive) = strip_directive(template);
    let mut em = Emitter::default();
    render_seq(body.to_string(), ctx, &mut em).await?;
    Ok(em.finish(directive))
}

/// Peel a trailing navigation marker off the answer template.
fn strip_directive(template: &str) -> (&str, Directive) {
    let t = template.trim_end();
    if let Some(body) = t.strip_suffix("<--") {
        (body.trim_end(), Directive::ResetTop)
    } else if let Some(body) = t.strip_suffix("<-") {
        (body.trim_end(), Directive::PopOne)
    } else {
        (t, Directive::Advance)
    }
}

// ── Output assembly ────────────────────────────────────────────────────────
// Collapses whitespace as it goes so marker substitution never leaves double
// spaces, and records emotion spans as byte ranges into the final text.

#[derive(Default)]
struct Emitter {
    out: String,
    pending_space: bool,
    prosody: Vec<ProsodySpan>,
}

impl Emitter {
    fn push_char(&mut self, c: char) {
        if c.is_whitespace() {
            if !self.out.is_empty() {
                self.pending_space = true;
            }
            return;
        }
        if self.pending_space {
            self.out.push(' ');
            self.pending_space = false;
        }
        self.out.push(c);
    }

    fn push_str(&mut self, s: &str) {
        for c in s.chars() {
            self.push_char(c);
        }
    }

    /// Current committed position, with any pending separator applied.
    fn mark(&mut self) -> usize {
        if self.pending_space && !self.out.is_empty() {
            self.out.push(' ');
            self.pending_space = false;
        }
        self.out.len()
    }

    fn finish(mut self, directive: Directive) -> Rendered {
        while self.out.ends_with([' ', ',']) {
            self.out.pop();
        }
        let len = self.out.len();
        self.prosody.retain_mut(|s| {
            s.end = s.end.min(len);
            s.start < s.end
        });
        Rendered { text: self.out, prosody: self.prosody, directive }
    }
}

// ── Recursive expansion ────────────────────────────────────────────────────

fn render_seq<'s>(
    text: String,
    ctx: &'s RenderContext<'_>,
    em: &'s mut Emitter,
) -> BoxFuture<'s, MindResult<()>> {
    async move {
        // Alternative group at this nesting level: pick one branch.
        let branches = split_top_level(&text, '|');
        if branches.len() > 1 {
            let pick = rand::thread_rng().gen_range(0..branches.len());
            return render_seq(branches[pick].trim().to_string(), ctx, em).await;
        }

        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            match c {
                '(' => {
                    let end = matching(&chars, i, '(', ')')
                        .ok_or_else(|| MindError::render("unbalanced '(' in answer"))?;
                    let inner: String = chars[i + 1..end].iter().collect();
                    render_seq(inner.trim().to_string(), ctx, em).await?;
                    i = end + 1;
                }
                '[' => {
                    let end = matching(&chars, i, '[', ']')
                        .ok_or_else(|| MindError::render("unbalanced '[' in answer"))?;
                    let inner: String = chars[i + 1..end].iter().collect();
                    // `[a | b]` is a choice, `[o]` a coin flip.
                    let is_choice = split_top_level(&inner, '|').len() > 1;
                    let include = is_choice || rand::thread_rng().gen_bool(0.5);
                    if include {
                        render_seq(inner.trim().to_string(), ctx, em).await?;
                    }
                    i = end + 1;
                }
                '%' | '!' => {
                    let name = read_marker_name(&chars, i + 1);
                    let open = i + 1 + name.chars().count();
                    if name.is_empty() || chars.get(open) != Some(&'(') {
                        em.push_char(c);
                        i += 1;
                        continue;
                    }
                    let end = matching(&chars, open, '(', ')')
                        .ok_or_else(|| MindError::render(format!("unbalanced marker {c}{name}(")))?;
                    let inner: String = chars[open + 1..end].iter().collect();
                    if c == '%' {
                        apply_emotion(&name, inner, ctx, em).await?;
                    } else {
                        invoke_action(&name, inner, ctx).await?;
                    }
                    i = end + 1;
                }
                '$' => {
                    let name = read_var_name(&chars, i + 1);
                    if name.is_empty() {
                        em.push_char('$');
                        i += 1;
                        continue;
                    }
                    let value = ctx
                        .bindings
                        .get(&name)
                        .ok_or_else(|| MindError::render(format!("unbound variable ${name}")))?;
                    em.push_str(value);
                    i += name.chars().count() + 1;
                }
                '#' => {
                    let name = read_marker_name(&chars, i + 1);
                    if name.is_empty() {
                        em.push_char('#');
                        i += 1;
                        continue;
                    }
                    em.push_str(&ctx.concepts.generate(&name)?);
                    i += name.chars().count() + 1;
                }
                '.' if chars.get(i + 1) == Some(&'.') => {
                    // Pause marker; the navigation variants were stripped up
                    // front, so any dot run here is spoken silence.
                    while chars.get(i) == Some(&'.') {
                        i += 1;
                    }
                }
                _ => {
                    em.push_char(c);
                    i += 1;
                }
            }
        }
        Ok(())
    }
    .boxed()
}

async fn apply_emotion(
    name: &str,
    inner: String,
    ctx: &RenderContext<'_>,
    em: &mut Emitter,
) -> MindResult<()> {
    let transform = ctx
        .emotions
        .get(name)
        .ok_or_else(|| MindError::render(format!("unknown emotion %{name}")))?
        .clone();
    let start = em.mark();
    render_seq(inner, ctx, em).await?;
    let end = em.out.len();
    let params = transform(&em.out[start..end]);
    em.prosody.push(ProsodySpan { start, end, emotion: name.to_string(), params });
    Ok(())
}

async fn invoke_action(name: &str, inner: String, ctx: &RenderContext<'_>) -> MindResult<()> {
    let handler = ctx
        .actions
        .get(name)
        .ok_or_else(|| MindError::render(format!("unknown action !{name}")))?
        .clone();
    let mut args = Vec::new();
    for raw in split_top_level(&inner, ',') {
        let mut tmp = Emitter::default();
        render_seq(raw.trim().to_string(), ctx, &mut tmp).await?;
        args.push(tmp.finish(Directive::Advance).text);
    }
    handler.invoke(args).await
}

// ── Scanning helpers ───────────────────────────────────────────────────────

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

/// Split on `sep` at bracket depth zero.
fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            _ if c == sep && depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Uppercase marker names (`%SAD`, `!SMS`, `#JOKE`).
fn read_marker_name(chars: &[char], from: usize) -> String {
    let name: String = chars[from..]
        .iter()
        .take_while(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || **c == '_')
        .collect();
    if name.starts_with(|c: char| c.is_ascii_uppercase()) {
        name
    } else {
        String::new()
    }
}

/// Lowercase variable names (`$insult`).
fn read_var_name(chars: &[char], from: usize) -> String {
    chars[from..]
        .iter()
        .take_while(|c| c.is_alphanumeric() || **c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::concepts::builtin_concepts;
    use parking_lot::Mutex;

    fn emotions() -> EmotionTable {
        let mut t: EmotionTable = HashMap::new();
        t.insert(
            "SAD".into(),
            Arc::new(|_: &str| EmotionParams { speed: Some(0.8), pitch: Some(0.7), volume: None }),
        );
        t
    }

    async fn run(template: &str, bindings: &[(&str, &str)]) -> MindResult<Rendered> {
        let bindings: HashMap<String, String> = bindings
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let concepts = builtin_concepts("HAL", "Dave");
        let emotions = emotions();
        let actions: ActionTable = HashMap::new();
        let ctx = RenderContext {
            bindings: &bindings,
            concepts: &concepts,
            emotions: &emotions,
            actions: &actions,
        };
        render(template, &ctx).await
    }

    #[tokio::test]
    async fn plain_text_renders_unchanged() {
        let r = run("You're welcome!", &[]).await.unwrap();
        assert_eq!(r.text, "You're welcome!");
        assert_eq!(r.directive, Directive::Advance);
    }

    #[tokio::test]
    async fn rendering_without_alternatives_is_deterministic() {
        let first = run("I'm sorry, $name.", &[("name", "Dave")]).await.unwrap();
        for _ in 0..20 {
            let again = run("I'm sorry, $name.", &[("name", "Dave")]).await.unwrap();
            assert_eq!(again.text, first.text);
        }
    }

    #[tokio::test]
    async fn alternatives_cover_both_branches() {
        let mut seen_a = false;
        let mut seen_b = false;
        for _ in 0..200 {
            let r = run("alpha | beta", &[]).await.unwrap();
            match r.text.as_str() {
                "alpha" => seen_a = true,
                "beta" => seen_b = true,
                other => panic!("unexpected branch {other:?}"),
            }
        }
        assert!(seen_a && seen_b, "both alternatives must appear over 200 renders");
    }

    #[tokio::test]
    async fn optional_suffix_yields_both_forms() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(run("No problem[o]!", &[]).await.unwrap().text);
        }
        assert!(seen.contains("No problem!"));
        assert!(seen.contains("No problemo!"));
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn thanks_answer_renders_one_known_form() {
        let r = run("You're welcome! | No problem[o]!", &[]).await.unwrap();
        assert!(
            ["You're welcome!", "No problem!", "No problemo!"].contains(&r.text.as_str()),
            "got {:?}",
            r.text
        );
    }

    #[tokio::test]
    async fn unbound_variable_is_a_render_error() {
        let err = run("Hello $nobody", &[]).await.unwrap_err();
        assert!(matches!(err, MindError::Render(_)));
    }

    #[tokio::test]
    async fn emotion_marker_unwraps_text_and_records_prosody() {
        let r = run("I'm sorry, #HUMAN. %SAD(I'm afraid I can't do that)", &[])
            .await
            .unwrap();
        assert_eq!(r.text, "I'm sorry, Dave. I'm afraid I can't do that");
        assert!(!r.text.contains("%SAD"));
        assert_eq!(r.prosody.len(), 1);
        let span = &r.prosody[0];
        assert_eq!(span.emotion, "SAD");
        assert_eq!(&r.text[span.start..span.end], "I'm afraid I can't do that");
        assert_eq!(span.params.speed, Some(0.8));
    }

    #[tokio::test]
    async fn unknown_emotion_is_a_render_error() {
        assert!(run("%GLEE(hi)", &[]).await.is_err());
    }

    #[tokio::test]
    async fn unknown_action_is_a_render_error() {
        assert!(run("!LAUNCH(now)", &[]).await.is_err());
    }

    #[tokio::test]
    async fn action_marker_contributes_no_text_and_fires_before_return() {
        let calls: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let log = calls.clone();
        let mut actions: ActionTable = HashMap::new();
        actions.insert(
            "SMS".into(),
            Arc::new(FnAction(move |args: Vec<String>| log.lock().push(args))),
        );

        let bindings: HashMap<String, String> = [
            ("person".to_string(), "Frank".to_string()),
            ("message".to_string(), "see you".to_string()),
        ]
        .into();
        let concepts = builtin_concepts("HAL", "Dave");
        let emotions = emotions();
        let ctx = RenderContext {
            bindings: &bindings,
            concepts: &concepts,
            emotions: &emotions,
            actions: &actions,
        };
        let r = render("!SMS($person, $message) It's out!", &ctx).await.unwrap();
        assert_eq!(r.text, "It's out!");
        assert_eq!(calls.lock().as_slice(), &[vec!["Frank".to_string(), "see you".to_string()]]);
    }

    #[tokio::test]
    async fn concept_generation_marker_is_replaced() {
        let r = run("#HUMAN", &[]).await.unwrap();
        assert_eq!(r.text, "Dave");
        let r = run("#JOKE", &[]).await.unwrap();
        assert!(!r.text.is_empty());
    }

    #[tokio::test]
    async fn generate_unavailable_direction_errors() {
        assert!(run("#ARTICLE", &[]).await.is_err());
    }

    #[tokio::test]
    async fn pop_one_directive_is_stripped() {
        let r = run("Sorry, <-", &[]).await.unwrap();
        assert_eq!(r.directive, Directive::PopOne);
        assert_eq!(r.text, "Sorry");
    }

    #[tokio::test]
    async fn reset_top_directive_is_stripped() {
        let r = run("Ok, not sending it. <--", &[]).await.unwrap();
        assert_eq!(r.directive, Directive::ResetTop);
        assert_eq!(r.text, "Ok, not sending it.");
    }

    #[tokio::test]
    async fn pause_dots_are_stripped_from_output() {
        let r = run("Hello, $name! ...", &[("name", "Dave")]).await.unwrap();
        assert_eq!(r.text, "Hello, Dave!");
    }

    #[tokio::test]
    async fn bracketed_choice_always_includes_one_branch() {
        for _ in 0..50 {
            let r = run("[left | right]", &[]).await.unwrap();
            assert!(["left", "right"].contains(&r.text.as_str()), "got {:?}", r.text);
        }
    }

    #[tokio::test]
    async fn nested_group_choice_renders() {
        for _ in 0..50 {
            let r = run("(Hello | Good #HUMAN), friend!", &[]).await.unwrap();
            assert!(
                ["Hello, friend!", "Good Dave, friend!"].contains(&r.text.as_str()),
                "got {:?}",
                r.text
            );
        }
    }
}
