use criterion::{black_box, criterion_group, criterion_main, Criterion};
use parlance::engine::{
    builtin_concepts, compile_rules, default_conversation, match_pattern, select_best, tokenize,
    Pattern,
};

fn bench_parse(c: &mut Criterion) {
    let reg = builtin_concepts("HAL", "Dave");
    c.bench_function("parse_default_conversation", |b| {
        b.iter(|| {
            for (question, _) in default_conversation() {
                black_box(Pattern::parse(&question, &reg).unwrap());
            }
        })
    });
}

fn bench_match(c: &mut Criterion) {
    let reg = builtin_concepts("HAL", "Dave");
    let rules = compile_rules(&default_conversation(), &reg).unwrap();
    let patterns: Vec<&Pattern> = rules.iter().map(|r| &r.pattern).collect();

    let utterances = [
        "Open the pod bay doors",
        "Good morning HAL",
        "Send a message to Frank",
        "Translate good day into French",
        "colorless green ideas sleep furiously",
    ];

    c.bench_function("select_best_default_conversation", |b| {
        b.iter(|| {
            for u in &utterances {
                let tokens = tokenize(u);
                black_box(select_best(&patterns, &tokens, &reg));
            }
        })
    });

    let doors = Pattern::parse("Open #ARTICLE [<#ADJECTIVE>] [pod bay] door[s]", &reg).unwrap();
    let tokens = tokenize("Open the damn pod bay doors");
    c.bench_function("match_single_pattern", |b| {
        b.iter(|| black_box(match_pattern(&doors, &tokens, &reg)))
    });
}

criterion_group!(benches, bench_parse, bench_match);
criterion_main!(benches);
