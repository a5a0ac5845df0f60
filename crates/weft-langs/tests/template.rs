use expect_test::expect;
use weft_engine::{Document, ParseOptions, Stage, Value};
use weft_langs::calc::evaluate;
use weft_langs::tags::TagContext;
use weft_langs::{tags, template};

fn parse(text: &str) -> Document<TagContext> {
    template::language().unwrap().parse(text, &ParseOptions::default()).unwrap().document
}

fn embeds(document: &Document<TagContext>) -> Vec<i64> {
    let p = document.root().as_node().unwrap();
    let children = document.field(p, "children").and_then(Value::as_node).unwrap();
    document
        .items(children)
        .unwrap()
        .iter()
        .filter_map(Value::as_node)
        .filter(|&child| document.kind(child) == Some("Embed"))
        .map(|embed| evaluate(document, document.field(embed, "expr").unwrap()).unwrap())
        .collect()
}

#[test]
fn expressions_inside_markup() {
    let text = "<p>{1 + 2} and { 3*4 }</p>";
    let mut document = parse(text);
    expect![[r#"
        Element
          name: "p"
          attributes: []
          children: [
            Embed
              expr: Sum
                first: "1"
                rest: [
                  Operation
                    op: "+"
                    operand: "2"
                ]
            " and "
            Embed
              expr: Product
                first: "3"
                rest: [
                  Operation
                    op: "*"
                    operand: "4"
                ]
          ]
    "#]]
    .assert_eq(&document.dump(document.root()));
    assert_eq!(embeds(&document), [3, 12]);
    assert_eq!(document.text().unwrap(), text);
}

#[test]
fn markup_without_expressions_is_unchanged() {
    let text = "<p>plain</p>";
    let mut document = parse(text);
    assert_eq!(document.text().unwrap(), text);

    // Braces are text to the markup grammar alone.
    let tags = tags::language().unwrap();
    assert!(tags.parse("<p>{1}</p>", &ParseOptions::default()).is_ok());
}

#[test]
fn edited_expression_is_regenerated() {
    let mut document = parse("<p>{ 1 + 2 }!</p>");
    let p = document.root().as_node().unwrap();
    document.set_stage(p, Stage::Started);
    let children = document.field(p, "children").and_then(Value::as_node).unwrap();
    let bang = document.items(children).unwrap()[1].clone();
    assert_eq!(bang, Value::from("!"));
    let embed = document.items(children).unwrap()[0].as_node().unwrap();

    document.set_field(embed, "expr", "7".into()).unwrap();
    assert_eq!(document.text().unwrap(), "<p>{7}!</p>");
    assert_eq!(embeds(&document), [7]);
}
