use std::hash::{Hash as _, Hasher as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use expect_test::expect;
use rustc_hash::FxHasher;
use text_size::{TextRange, TextSize};
use weft_grammar::{
    Accept, AcceptInput, Build, CharSet, Grammar, GrammarBuilder, ParseletId, Recovery,
    SemanticContext, field,
};

use crate::{
    CopyOptions, Document, EditError, GenerateError, IdentityMap, NodeId, ParseError,
    ParseOptions, Parsed, Stage, Value, generate, parse,
};

/// `{key=value;...}` blocks, where a value is a number or a nested block.
struct Blocks {
    grammar: Arc<Grammar<()>>,
    start: ParseletId,
}

impl Blocks {
    /// `recovery` is given the parselet that skips to the next `;`.
    fn new(recovery: fn(ParseletId) -> Recovery) -> Self {
        let mut b = GrammarBuilder::<()>::new();
        let ws =
            b.class(CharSet::whitespace()).repeat().optional().skip().no_error().named("ws").id();
        let name = b.class(CharSet::ascii_alpha()).repeat().named("name").id();
        let number = b.class(CharSet::ascii_digit()).repeat().named("number").id();
        let block = b.forward().named("block").id();
        let value = b.choice([number, block]).named("value").id();
        let eq = b.literal("=").id();
        let semi = b.literal(";").id();
        let junk = b.class(CharSet::chars(";}").negate()).repeat().optional().id();
        let skip = b.seq([junk.into(), semi.into()]).named("skip").id();
        let recovery = recovery(skip);
        let entries = b
            .seq([
                ws.into(),
                field("key", name),
                ws.into(),
                eq.into(),
                ws.into(),
                field("value", value),
                ws.into(),
                semi.into(),
            ])
            .object("Entry")
            .repeat()
            .optional()
            .recover(recovery)
            .named("entries")
            .id();
        let open = b.literal("{").id();
        let close = b.literal("}").id();
        let body = b
            .seq([open.into(), field("entries", entries), ws.into(), close.into()])
            .object("Block")
            .named("body")
            .id();
        b.define(block, body);
        let start = b.seq([ws.into(), block.into(), ws.into()]).named("document").id();
        Self { grammar: Arc::new(b.start().unwrap()), start }
    }

    fn parse(&self, text: &str) -> Document<()> {
        self.parse_with(text, &ParseOptions::default()).unwrap().document
    }

    fn parse_with(&self, text: &str, options: &ParseOptions) -> Result<Parsed<()>, ParseError> {
        parse(&self.grammar, self.start, text, &mut (), options)
    }
}

fn blocks() -> Blocks {
    Blocks::new(|_| Recovery::None)
}

fn root(document: &Document<()>) -> NodeId {
    document.root().as_node().unwrap()
}

fn entries(document: &Document<()>, block: NodeId) -> NodeId {
    document.field(block, "entries").and_then(Value::as_node).unwrap()
}

fn item(document: &Document<()>, list: NodeId, index: usize) -> NodeId {
    document.items(list).unwrap()[index].as_node().unwrap()
}

fn new_entry(document: &mut Document<()>, key: &str, value: &str) -> NodeId {
    let entry = document.new_object("Entry");
    document.set_field(entry, "key", key.into()).unwrap();
    document.set_field(entry, "value", value.into()).unwrap();
    entry
}

fn text(document: &mut Document<()>) -> String {
    document.text().unwrap()
}

#[test]
fn single_token_grammar() {
    let mut b = GrammarBuilder::<()>::new();
    let number = b.class(CharSet::ascii_digit()).repeat().named("number").id();
    let grammar = Arc::new(b.start().unwrap());

    let parsed = parse(&grammar, number, "42", &mut (), &ParseOptions::default()).unwrap();
    assert!(parsed.is_clean());
    assert_eq!(parsed.value(), &Value::from("42"));

    let mut document = parsed.document;
    let tree = generate(&mut document, number, &Value::from("42"), true).unwrap();
    assert_eq!(tree.text(), "42");

    let error = generate(&mut document, number, &Value::from("4x"), true).unwrap_err();
    assert_eq!(error.to_string(), "cannot render with `number`: \"4x\" does not match");
}

#[test]
fn semantic_tree() {
    let document = blocks().parse("{a=1;b={c=2;};}");
    expect![[r#"
        Block
          entries: [
            Entry
              key: "a"
              value: "1"
            Entry
              key: "b"
              value: Block
                entries: [
                  Entry
                    key: "c"
                    value: "2"
                ]
          ]
    "#]]
    .assert_eq(&document.dump(document.root()));
}

#[test]
fn parse_tree() {
    let document = blocks().parse("{a=1;}");
    expect![[r#"
        document@0..6
          body@0..6
            '{'@0..1 "{"
            entries*@1..5
              entries@1..5
                name@1..2 "a"
                '='@2..3 "="
                number@3..4 "1"
                ';'@4..5 ";"
            '}'@5..6 "}"
    "#]]
    .assert_eq(&document.debug_tree());
}

#[test]
fn round_trip_keeps_layout() {
    let text = "  { a = 1 ;\n  b={ c=2;} ;\n}\n";
    let mut document = blocks().parse(text);
    assert_eq!(document.text().unwrap(), text);

    let block = root(&document);
    let list = entries(&document, block);
    let a = item(&document, list, 0);
    assert_eq!(document.to_text(a).unwrap(), " a = 1 ;");
    assert_eq!(document.to_text(block).unwrap(), "{ a = 1 ;\n  b={ c=2;} ;\n}");
}

#[test]
fn regenerating_a_valid_node_changes_nothing() {
    let mut document = blocks().parse("{a=1;}");
    let block = root(&document);
    let before = document.parse_node(block).cloned().unwrap();

    assert!(document.regenerate(block, true));
    assert!(document.regenerate(block, false));
    assert!(document.parse_node(block).unwrap().ptr_eq(&before));
    assert!(!document.is_invalid(block));
}

#[test]
fn ordered_choice_takes_the_first_match() {
    let mut b = GrammarBuilder::<()>::new();
    let a = b.literal("a").id();
    let ab = b.literal("ab").id();
    let first = b.seq([a.into()]).object("First").id();
    let second = b.seq([a.into()]).object("Second").id();
    let longer = b.seq([ab.into()]).object("Longer").id();
    let pick = b.choice([first, second, longer]).id();
    let tail = b.literal("b").optional().id();
    let start = b.seq([pick.into(), tail.into()]).build(Build::Pass(0)).id();
    let grammar = Arc::new(b.start().unwrap());

    let parsed = parse(&grammar, start, "ab", &mut (), &ParseOptions::default()).unwrap();
    let root = parsed.value().as_node().unwrap();
    assert_eq!(parsed.document.kind(root), Some("First"));
}

#[test]
fn indexed_choice_falls_back_to_default() {
    let mut b = GrammarBuilder::<()>::new();
    let ab = b.literal("ab").id();
    let word = b.class(CharSet::ascii_alpha()).repeat().named("word").id();
    let start = b.indexed([('a', ab)], Some(word)).named("start").id();
    let grammar = Arc::new(b.start().unwrap());

    let parsed = parse(&grammar, start, "ab", &mut (), &ParseOptions::default()).unwrap();
    assert_eq!(parsed.value(), &Value::from("ab"));
    let parsed = parse(&grammar, start, "ac", &mut (), &ParseOptions::default()).unwrap();
    assert_eq!(parsed.value(), &Value::from("ac"));
    let parsed = parse(&grammar, start, "xy", &mut (), &ParseOptions::default()).unwrap();
    assert_eq!(parsed.value(), &Value::from("xy"));
}

#[test]
fn strict_errors() {
    let blocks = blocks();
    let options = ParseOptions::default();

    let error = blocks.parse_with("{a 1;}", &options).err().unwrap();
    assert_eq!(
        error,
        ParseError::NoMatch {
            range: TextRange::new(3.into(), 4.into()),
            message: "expected `=`".to_string()
        }
    );

    let error = blocks.parse_with("{a=", &options).err().unwrap();
    assert_eq!(
        error,
        ParseError::PrematureEof {
            offset: 3.into(),
            message: "expected number or `{`".to_string()
        }
    );

    let error = blocks.parse_with("{a=1;}x", &options).err().unwrap();
    assert_eq!(
        error,
        ParseError::NoMatch {
            range: TextRange::new(6.into(), 7.into()),
            message: "unexpected input".to_string()
        }
    );
}

#[test]
fn step_limit() {
    let options = ParseOptions { max_steps: Some(5), ..ParseOptions::default() };
    let error = blocks().parse_with("{a=1;b=2;}", &options).err().unwrap();
    assert!(matches!(error, ParseError::ResourceExceeded { limit: 5, .. }));
    assert_eq!(error.to_string(), "parse gave up after 5 steps");
}

#[test]
fn unconsumed_input_is_reported_in_tolerant_modes() {
    let mut b = GrammarBuilder::<()>::new();
    let digits = b.class(CharSet::ascii_digit()).repeat().optional().named("digits").id();
    let grammar = Arc::new(b.start().unwrap());
    let expected = ParseError::NoMatch {
        range: TextRange::new(0.into(), 1.into()),
        message: "expected digits".to_string(),
    };

    let strict = parse(&grammar, digits, "abc", &mut (), &ParseOptions::default());
    assert_eq!(strict.err(), Some(expected.clone()));

    let partial = ParseOptions { partial_values: true, ..ParseOptions::default() };
    let recovering = ParseOptions { error_recovery: true, ..ParseOptions::default() };
    for options in [partial, recovering] {
        let parsed = parse(&grammar, digits, "abc", &mut (), &options).unwrap();
        assert!(!parsed.is_clean());
        assert_eq!(parsed.errors, [expected.clone()]);
        assert_eq!(parsed.trailing, Some(TextRange::new(0.into(), 3.into())));
    }
}

#[test]
fn negation_keeps_keywords_apart_from_identifiers() {
    let mut b = GrammarBuilder::<()>::new();
    let kw = b.literal("if").id();
    let word_char = b.class(CharSet::ascii_alphanumeric()).negate().id();
    let keyword = b.seq([field("kw", kw), word_char.into()]).object("Keyword").id();
    let letters = b.class(CharSet::ascii_alpha()).repeat().id();
    let ident = b.seq([field("name", letters)]).object("Ident").id();
    let word = b.choice([keyword, ident]).named("word").id();
    let grammar = Arc::new(b.start().unwrap());

    let parsed = parse(&grammar, word, "if", &mut (), &ParseOptions::default()).unwrap();
    let root = parsed.value().as_node().unwrap();
    assert_eq!(parsed.document.kind(root), Some("Keyword"));
    assert_eq!(parsed.document.field(root, "kw"), Some(&Value::from("if")));

    let parsed = parse(&grammar, word, "iffy", &mut (), &ParseOptions::default()).unwrap();
    let root = parsed.value().as_node().unwrap();
    assert_eq!(parsed.document.kind(root), Some("Ident"));
    assert_eq!(parsed.document.field(root, "name"), Some(&Value::from("iffy")));

    let mut document = Document::new(Arc::clone(&grammar), word);
    let keyword = document.new_object("Keyword");
    document.set_field(keyword, "kw", "if".into()).unwrap();
    document.set_root(keyword.into());
    assert_eq!(document.text().unwrap(), "if");
}

#[test]
fn lookahead_does_not_consume() {
    let mut b = GrammarBuilder::<()>::new();
    let letters = b.class(CharSet::ascii_alpha()).repeat().id();
    let paren = b.literal("(").lookahead().id();
    let call = b.seq([field("name", letters), paren.into()]).object("Call").id();
    let var = b.seq([field("name", letters)]).object("Var").id();
    let term = b.choice([call, var]).id();
    let args = b.literal("()").optional().id();
    let start = b.seq([term.into(), args.into()]).build(Build::Pass(0)).id();
    let grammar = Arc::new(b.start().unwrap());

    let mut parsed = parse(&grammar, start, "f()", &mut (), &ParseOptions::default()).unwrap();
    let root = parsed.value().as_node().unwrap();
    assert_eq!(parsed.document.kind(root), Some("Call"));
    assert_eq!(parsed.document.to_text(root).unwrap(), "f");

    let parsed = parse(&grammar, start, "f", &mut (), &ParseOptions::default()).unwrap();
    let root = parsed.value().as_node().unwrap();
    assert_eq!(parsed.document.kind(root), Some("Var"));
}

#[test]
fn partial_values_complete_truncated_input() {
    let options = ParseOptions { partial_values: true, ..ParseOptions::default() };
    let parsed = blocks().parse_with("{a=", &options).unwrap();
    let messages: Vec<String> = parsed.errors.iter().map(ToString::to_string).collect();
    assert_eq!(messages, ["expected value", "expected `;`", "expected `}`"]);
    assert!(parsed.errors.iter().all(|error| error.range() == TextRange::empty(TextSize::from(3))));

    let mut document = parsed.document;
    expect![[r#"
        Block
          entries: [
            Entry
              key: "a"
          ]
    "#]]
    .assert_eq(&document.dump(document.root()));
    assert_eq!(text(&mut document), "{a=");
}

#[test]
fn recovery_skips_broken_elements() {
    let blocks = Blocks::new(Recovery::SkipWith);
    let options = ParseOptions { error_recovery: true, ..ParseOptions::default() };
    let parsed = blocks.parse_with("{a=1;b;c=3;}", &options).unwrap();
    assert_eq!(
        parsed.errors,
        [ParseError::NoMatch {
            range: TextRange::new(5.into(), 7.into()),
            message: "expected `=`".to_string()
        }]
    );

    let mut document = parsed.document;
    expect![[r#"
        document@0..12
          body@0..12
            '{'@0..1 "{"
            entries*@1..11
              entries@1..5
                name@1..2 "a"
                '='@2..3 "="
                number@3..4 "1"
                ';'@4..5 ";"
              ERROR skip@5..7 "b;"
              entries@7..11
                name@7..8 "c"
                '='@8..9 "="
                number@9..10 "3"
                ';'@10..11 ";"
            '}'@11..12 "}"
    "#]]
    .assert_eq(&document.debug_tree());
    assert_eq!(text(&mut document), "{a=1;b;c=3;}");

    // The error token has no list item, so the list is regenerated instead
    // of patched, and the broken text is dropped.
    let block = root(&document);
    document.set_stage(block, Stage::Started);
    let list = entries(&document, block);
    let d = new_entry(&mut document, "d", "4");
    document.push(list, d.into()).unwrap();
    assert_eq!(text(&mut document), "{a=1;c=3;d=4;}");
}

#[test]
fn resync_skips_to_the_next_line() {
    let blocks = Blocks::new(|_| Recovery::Resync);
    let options = ParseOptions {
        error_recovery: true,
        resync: CharSet::chars("\n}"),
        ..ParseOptions::default()
    };
    let parsed = blocks.parse_with("{a=1;\n?\nc=3;}", &options).unwrap();
    assert_eq!(parsed.errors.len(), 1);
    assert_eq!(parsed.errors[0].range(), TextRange::new(5.into(), 7.into()));
    expect![[r#"
        Block
          entries: [
            Entry
              key: "a"
              value: "1"
            Entry
              key: "c"
              value: "3"
          ]
    "#]]
    .assert_eq(&parsed.document.dump(parsed.value()));
    expect![[r#"expected name"#]].assert_eq(&parsed.errors[0].to_string());
}

/// Stack of marks. Only a keyed stack hands out fingerprints.
#[derive(Default)]
struct Stack {
    marks: Vec<char>,
    keyed: bool,
}

impl SemanticContext for Stack {
    type Snapshot = Vec<char>;

    fn snapshot(&self) -> Vec<char> {
        self.marks.clone()
    }

    fn restore(&mut self, snapshot: Vec<char>) {
        self.marks = snapshot;
    }

    fn fingerprint(&self) -> Option<u64> {
        self.keyed.then(|| {
            let mut hasher = FxHasher::default();
            self.marks.hash(&mut hasher);
            hasher.finish()
        })
    }
}

struct Push;

impl Accept<Stack> for Push {
    fn accept(&self, cx: &mut Stack, input: AcceptInput<'_>) -> Result<(), String> {
        cx.marks.extend(input.text.chars());
        Ok(())
    }
}

struct PushMark(char);

impl Accept<Stack> for PushMark {
    fn accept(&self, cx: &mut Stack, _: AcceptInput<'_>) -> Result<(), String> {
        cx.marks.push(self.0);
        Ok(())
    }
}

/// Accepts only when `want` is the innermost mark.
struct Top {
    want: char,
    calls: Arc<AtomicUsize>,
}

impl Accept<Stack> for Top {
    fn accept(&self, cx: &mut Stack, _: AcceptInput<'_>) -> Result<(), String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if cx.marks.last() == Some(&self.want) {
            Ok(())
        } else {
            Err(format!("needs {}", self.want))
        }
    }
}

/// `qz!` or `qz?`, where each `q` pushes its own mark and both alternatives
/// share one cached `z` that wants the mark `b`.
fn marked_alternatives(
    marks: [char; 2],
    calls: &Arc<AtomicUsize>,
) -> (Arc<Grammar<Stack>>, ParseletId) {
    let mut b = GrammarBuilder::<Stack>::new();
    let z = b.literal("z").accept(Top { want: 'b', calls: Arc::clone(calls) }).cache().id();
    let bang = b.literal("!").id();
    let question = b.literal("?").id();
    let mut alternatives = Vec::new();
    for (mark, end) in marks.into_iter().zip([bang, question]) {
        let q = b.literal("q").accept(PushMark(mark)).id();
        alternatives.push(b.seq([q.into(), z.into(), end.into()]).id());
    }
    let start = b.choice(alternatives).id();
    (Arc::new(b.start().unwrap()), start)
}

#[test]
fn cached_hooks_do_not_leak_across_contexts() {
    for keyed in [false, true] {
        let calls = Arc::new(AtomicUsize::new(0));
        let (grammar, start) = marked_alternatives(['a', 'b'], &calls);
        let mut cx = Stack { keyed, ..Stack::default() };
        parse(&grammar, start, "qz?", &mut cx, &ParseOptions::default()).unwrap();
        assert_eq!(cx.marks, ['b'], "keyed: {keyed}");
        assert_eq!(calls.load(Ordering::Relaxed), 2, "keyed: {keyed}");
    }
}

#[test]
fn cached_hooks_are_reused_under_an_equal_fingerprint() {
    for (keyed, expected) in [(false, 2), (true, 1)] {
        let calls = Arc::new(AtomicUsize::new(0));
        let (grammar, start) = marked_alternatives(['b', 'b'], &calls);
        let mut cx = Stack { keyed, ..Stack::default() };
        parse(&grammar, start, "qz?", &mut cx, &ParseOptions::default()).unwrap();
        assert_eq!(cx.marks, ['b'], "keyed: {keyed}");
        assert_eq!(calls.load(Ordering::Relaxed), expected, "keyed: {keyed}");
    }
}

#[test]
fn failed_alternatives_rewind_the_context() {
    let mut b = GrammarBuilder::<Stack>::new();
    let mark = b.class(CharSet::ascii_alpha()).accept(Push).named("mark").id();
    let bang = b.literal("!").id();
    let question = b.literal("?").id();
    let first = b.seq([mark.into(), bang.into()]).id();
    let second = b.seq([mark.into(), question.into()]).id();
    let start = b.choice([first, second]).id();
    let grammar = Arc::new(b.start().unwrap());

    let mut cx = Stack::default();
    parse(&grammar, start, "x?", &mut cx, &ParseOptions::default()).unwrap();
    assert_eq!(cx.marks, ['x']);

    let mut cx = Stack::default();
    assert!(parse(&grammar, start, "x.", &mut cx, &ParseOptions::default()).is_err());
    assert!(cx.marks.is_empty());
}

struct Count(Arc<AtomicUsize>);

impl Accept<()> for Count {
    fn accept(&self, (): &mut (), _: AcceptInput<'_>) -> Result<(), String> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn cached_parselets_run_once_per_position() {
    for (cache, expected) in [(false, 2), (true, 1)] {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut b = GrammarBuilder::<()>::new();
        let mut word = b.class(CharSet::ascii_alpha()).repeat().accept(Count(Arc::clone(&calls)));
        if cache {
            word = word.cache();
        }
        let word = word.id();
        let bang = b.literal("!").id();
        let question = b.literal("?").id();
        let first = b.seq([word.into(), bang.into()]).id();
        let second = b.seq([word.into(), question.into()]).id();
        let start = b.choice([first, second]).id();
        let grammar = Arc::new(b.start().unwrap());

        parse(&grammar, start, "ab?", &mut (), &ParseOptions::default()).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), expected, "cache: {cache}");
    }
}

struct Never;

impl Accept<()> for Never {
    fn accept(&self, (): &mut (), input: AcceptInput<'_>) -> Result<(), String> {
        Err(format!("`{}` is not allowed here", input.text))
    }
}

#[test]
fn every_alternative_rejected() {
    let mut b = GrammarBuilder::<()>::new();
    let letters = b.class(CharSet::ascii_alpha()).repeat().id();
    let first = b.reference(letters).accept(Never).id();
    let second = b.reference(letters).accept(Never).id();
    let start = b.choice([first, second]).named("word").id();
    let grammar = Arc::new(b.start().unwrap());

    let error = parse(&grammar, start, "ab", &mut (), &ParseOptions::default()).err().unwrap();
    let range = TextRange::new(0.into(), 2.into());
    assert_eq!(error, ParseError::AmbiguousContext { range, rule: "word".to_string() });
    assert_eq!(error.to_string(), "no alternative of word is valid in this context");
}

#[test]
fn insert_patches_the_list() {
    let blocks = blocks();
    let mut document = blocks.parse("{a=1;b=2;}");
    let block = root(&document);
    document.set_stage(block, Stage::Started);
    let list = entries(&document, block);
    let a = item(&document, list, 0);
    let a_node = document.parse_node(a).cloned().unwrap();

    let c = new_entry(&mut document, "c", "3");
    document.insert(list, 1, c.into()).unwrap();

    assert_eq!(text(&mut document), "{a=1;c=3;b=2;}");
    assert!(document.parse_node(a).unwrap().ptr_eq(&a_node));
    let range = document.tree().unwrap().range_of(&a_node);
    assert_eq!(range, Some(TextRange::new(1.into(), 5.into())));
    assert!(!document.is_invalid(c));
    assert!(!document.is_invalid(block));
    assert_eq!(document.stage(c), Stage::Started);
    assert_eq!(document.parent(c), Some(list));
}

fn insert_last(document: &mut Document<()>, list: NodeId) {
    let d = new_entry(document, "d", "4");
    document.insert(list, 3, d.into()).unwrap();
}

fn replace_second(document: &mut Document<()>, list: NodeId) {
    let d = new_entry(document, "d", "4");
    document.replace(list, 1, d.into()).unwrap();
}

fn remove_first(document: &mut Document<()>, list: NodeId) {
    document.remove(list, 0).unwrap();
}

#[test]
fn patching_agrees_with_regeneration() {
    let blocks = blocks();
    let edits: [(fn(&mut Document<()>, NodeId), &str); 3] = [
        (insert_last, "{a=1;b=2;c=3;d=4;}"),
        (replace_second, "{a=1;d=4;c=3;}"),
        (remove_first, "{b=2;c=3;}"),
    ];

    for (edit, expected) in edits {
        // Patched, regenerated with reuse, and generated from scratch.
        let mut results = Vec::new();
        for stage in [Stage::Started, Stage::Created] {
            let mut document = blocks.parse("{a=1;b=2;c=3;}");
            let block = root(&document);
            document.set_stage(block, stage);
            let list = entries(&document, block);
            edit(&mut document, list);
            results.push(text(&mut document));

            let mut fresh = document.extract(block, CopyOptions::default());
            results.push(text(&mut fresh));
        }
        assert!(results.iter().all(|result| result == expected), "{results:?}");
    }
}

#[test]
fn remove_detaches_the_item() {
    let mut document = blocks().parse("{a=1;b=2;}");
    let block = root(&document);
    document.set_stage(block, Stage::Started);
    let list = entries(&document, block);
    let b = item(&document, list, 1);
    let b_node = document.parse_node(b).cloned().unwrap();

    let removed = document.remove(list, 0).unwrap();
    let a = removed.as_node().unwrap();
    assert_eq!(document.parent(a), None);
    assert_eq!(text(&mut document), "{b=2;}");
    assert!(document.parse_node(b).unwrap().ptr_eq(&b_node));

    document.remove(list, 0).unwrap();
    assert_eq!(text(&mut document), "{}");
}

#[test]
fn field_edits() {
    let mut document = blocks().parse("{a=1; b=2;}");
    let block = root(&document);
    document.set_stage(block, Stage::Started);
    let list = entries(&document, block);
    let a = item(&document, list, 0);
    let b = item(&document, list, 1);
    let a_node = document.parse_node(a).cloned().unwrap();

    document.set_field(b, "value", "42".into()).unwrap();
    assert!(!document.is_invalid(block));
    assert_eq!(text(&mut document), "{a=1;b=42;}");
    assert!(document.parse_node(a).unwrap().ptr_eq(&a_node));

    let nested = document.new_object("Block");
    let inner = document.new_list();
    document.set_field(nested, "entries", inner.into()).unwrap();
    document.set_field(a, "value", nested.into()).unwrap();
    assert_eq!(text(&mut document), "{a={};b=42;}");
    assert_eq!(document.stage(inner), Stage::Started);
}

#[test]
fn edits_before_start_invalidate() {
    let mut document = blocks().parse("{a=1;b=2;}");
    let block = root(&document);
    let list = entries(&document, block);
    let b = item(&document, list, 1);

    document.set_field(b, "value", "7".into()).unwrap();
    assert!(document.is_invalid(b));
    assert!(document.is_invalid(list));
    assert!(document.is_invalid(block));
    assert_eq!(text(&mut document), "{a=1;b=7;}");
    assert!(!document.is_invalid(block));

    document.set_stage(block, Stage::Stopped);
    document.remove(list, 0).unwrap();
    assert!(document.is_invalid(block));
    assert_eq!(text(&mut document), "{b=7;}");
}

#[test]
fn shape_mismatch() {
    let mut document = blocks().parse("{a=1;}");
    let block = root(&document);
    let list = entries(&document, block);
    let a = item(&document, list, 0);

    document.set_field(a, "bogus", "1".into()).unwrap();
    let error = document.text().unwrap_err();
    assert_eq!(
        error,
        GenerateError::ShapeMismatch {
            parselet: "entries".to_string(),
            reason: "field `bogus` has no slot".to_string()
        }
    );

    document.remove_field(a, "bogus").unwrap();
    document.set_field(a, "value", "x".into()).unwrap();
    assert!(document.text().is_err());
    assert!(!document.regenerate(a, true));
}

#[test]
fn edit_errors() {
    let mut document = blocks().parse("{a=1;}");
    let block = root(&document);
    let list = entries(&document, block);
    let a = item(&document, list, 0);

    assert_eq!(
        document.insert(list, 5, Value::None),
        Err(EditError::IndexOutOfBounds { index: 5, len: 1 })
    );
    assert_eq!(document.remove(list, 1), Err(EditError::IndexOutOfBounds { index: 1, len: 1 }));
    assert_eq!(document.push(block, Value::None), Err(EditError::NotAList));
    assert_eq!(document.set_field(list, "x", Value::None), Err(EditError::NotAnObject));
    assert_eq!(document.push(list, a.into()), Err(EditError::AlreadyAttached));
    assert_eq!(document.set_field(a, "value", block.into()), Err(EditError::AlreadyAttached));
}

#[test]
fn deep_copies() {
    let mut document = blocks().parse("{a=1;b={c=2;};}");
    let block = root(&document);
    let list = entries(&document, block);
    let b = item(&document, list, 1);
    document.set_stage(block, Stage::Validated);

    let mut map = IdentityMap::default();
    let options = CopyOptions { parse_nodes: true, lifecycle: true };
    let bound = document.deep_copy(b, options, &mut map);
    assert_eq!(map[&b], bound);
    assert_eq!(document.parent(bound), None);
    assert!(document.parse_node(bound).unwrap().ptr_eq(document.parse_node(b).unwrap()));
    assert_eq!(document.stage(bound), Stage::Validated);
    let nested = document.field(bound, "value").and_then(Value::as_node).unwrap();
    assert_eq!(document.parent(nested), Some(bound));

    let mut map = IdentityMap::default();
    let fresh = document.deep_copy(b, CopyOptions::default(), &mut map);
    assert!(document.is_invalid(fresh));
    assert!(document.parse_node(fresh).is_none());
    assert_eq!(document.stage(fresh), Stage::Created);
    assert_eq!(document.to_text(fresh).unwrap(), "b={c=2;};");
    assert!(!document.parse_node(fresh).unwrap().ptr_eq(document.parse_node(b).unwrap()));
    assert!(!document.is_invalid(map[&nested_of(&document, b)]));
}

fn nested_of(document: &Document<()>, entry: NodeId) -> NodeId {
    document.field(entry, "value").and_then(Value::as_node).unwrap()
}

#[test]
fn programmatic_documents_generate_on_first_read() {
    let blocks = blocks();
    let mut document = Document::new(Arc::clone(&blocks.grammar), blocks.start);
    let block = document.new_object("Block");
    let list = document.new_list();
    document.set_field(block, "entries", list.into()).unwrap();
    let x = new_entry(&mut document, "x", "1");
    document.push(list, x.into()).unwrap();
    document.set_root(block.into());

    assert_eq!(text(&mut document), "{x=1;}");
    assert!(!document.is_invalid(block));
    assert!(!document.is_invalid(x));
    expect![[r#"
        document@0..6
          body@0..6
            '{'@0..1 "{"
            entries*@1..5
              entries@1..5
                name@1..2 "x"
                '='@2..3 "="
                number@3..4 "1"
                ';'@4..5 ";"
            '}'@5..6 "}"
    "#]]
    .assert_eq(&document.debug_tree());
}
