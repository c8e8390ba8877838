//! 规则引擎集成测试
//!
//! 测试完整的规则解析、求值、变更与存储工作流。

use rule_engine::{
    AttributeType, CompareOperator, EvaluationContext, FunctionRegistry, InMemoryCatalog,
    LogicalOperator, Operand, RuleError, RuleExecutor, RuleMutator, RuleNode, RuleParser,
    RuleStore,
};
use rule_shared::EngineConfig;
use serde_json::json;
use std::sync::Arc;

fn catalog() -> Arc<InMemoryCatalog> {
    let catalog = InMemoryCatalog::new();
    for (name, attr_type) in [
        ("age", AttributeType::Number),
        ("department", AttributeType::String),
        ("dept", AttributeType::String),
        ("balance", AttributeType::Number),
        ("salary", AttributeType::Number),
        ("experience", AttributeType::Number),
    ] {
        catalog.create(name, attr_type).unwrap();
    }
    Arc::new(catalog)
}

fn parser() -> RuleParser {
    RuleParser::new(catalog())
}

fn evaluate(root: &RuleNode, data: serde_json::Value) -> rule_engine::Result<bool> {
    RuleExecutor::new().evaluate(
        root,
        &EvaluationContext::new(data),
        &FunctionRegistry::new(),
    )
}

#[test]
fn test_parse_and_evaluate_conjunction() {
    let tree = parser().parse("age > 30 AND department = Sales").unwrap();

    assert_eq!(
        tree,
        RuleNode::and(
            RuleNode::comparison("age", CompareOperator::Gt, Operand::number(30.0)),
            RuleNode::comparison(
                "department",
                CompareOperator::Eq,
                Operand::identifier("Sales")
            ),
        )
    );

    assert!(evaluate(&tree, json!({ "age": 35, "department": "Sales" })).unwrap());
    assert!(!evaluate(&tree, json!({ "age": 20, "department": "Sales" })).unwrap());
}

#[test]
fn test_non_numeric_ordering_is_type_mismatch() {
    let tree = parser().parse("balance > 100").unwrap();
    let err = evaluate(&tree, json!({ "balance": "not-a-number" })).unwrap_err();
    assert!(matches!(err, RuleError::TypeMismatch { .. }));
}

#[test]
fn test_empty_rule_string() {
    assert!(matches!(parser().parse(""), Err(RuleError::EmptyInput)));
}

#[test]
fn test_incomplete_triple() {
    assert!(matches!(
        parser().parse("age >"),
        Err(RuleError::UnexpectedToken { .. })
    ));
}

#[test]
fn test_combine_two_rules() {
    let parser = parser();
    let mutator = RuleMutator::new(parser.clone());

    let a = parser.parse("age > 30").unwrap();
    let b = parser.parse("dept = X").unwrap();
    let (root, text) = mutator
        .combine(vec![
            (a, "age > 30".to_string()),
            (b, "dept = X".to_string()),
        ])
        .unwrap();

    assert_eq!(text, "age > 30 AND dept = X");
    assert_eq!(root.operator_kind(), "AND");
}

#[test]
fn test_combined_rule_is_conjunction_of_sources() {
    let parser = parser();
    let mutator = RuleMutator::new(parser.clone());
    let sources = [
        "age > 30 OR salary > 5000",
        "department = Sales",
        "experience < 10",
    ];

    let parts = sources
        .iter()
        .map(|text| (parser.parse(text).unwrap(), text.to_string()))
        .collect();
    let (combined, _) = mutator.combine(parts).unwrap();

    let records = [
        json!({ "age": 35, "salary": 100, "department": "Sales", "experience": 3 }),
        json!({ "age": 20, "salary": 100, "department": "Sales", "experience": 3 }),
        json!({ "age": 20, "salary": 9000, "department": "Sales", "experience": 3 }),
        json!({ "age": 40, "salary": 9000, "department": "HR", "experience": 3 }),
        json!({ "age": 40, "salary": 9000, "department": "Sales", "experience": 12 }),
    ];

    for record in records {
        let expected = sources
            .iter()
            .all(|text| evaluate(&parser.parse(text).unwrap(), record.clone()).unwrap());
        assert_eq!(evaluate(&combined, record.clone()).unwrap(), expected, "{}", record);
    }
}

#[test]
fn test_or_short_circuit_tolerates_bad_right_operand() {
    let tree = parser().parse("age > 30 OR balance > 100").unwrap();
    assert!(evaluate(&tree, json!({ "age": 35, "balance": "oops" })).unwrap());
    assert!(evaluate(&tree, json!({ "age": 20, "balance": "oops" })).is_err());
}

#[test]
fn test_regenerated_text_reparses_to_same_tree() {
    let parser = parser();
    for text in [
        "age > 30",
        "age > 30 AND department = Sales",
        "age > 30 AND department = Sales OR salary > 50000",
        "salary != experience OR department = 'HR'",
        "age > 1 OR age > 2 AND age > 3 OR age > 4",
    ] {
        let tree = parser.parse(text).unwrap();
        let regenerated = RuleMutator::regenerate_text(&tree);
        assert_eq!(parser.parse(&regenerated).unwrap(), tree, "{}", regenerated);
    }
}

#[test]
fn test_store_workflow() {
    let store = RuleStore::new(catalog(), FunctionRegistry::new(), &EngineConfig::default());
    let record = EvaluationContext::new(json!({
        "age": 45,
        "department": "Engineering",
        "salary": 80000,
        "experience": 12
    }));

    let rule = store.create("age > 30 AND department = Sales").unwrap();
    let id = rule.id().to_string();
    assert!(!store.evaluate(&id, &record).unwrap().matched);

    store
        .add_condition(&id, "experience > 10", LogicalOperator::Or)
        .unwrap();
    assert!(store.evaluate(&id, &record).unwrap().matched);

    let updated = store.remove_condition(&id, "department").unwrap().unwrap();
    assert_eq!(updated.source_text(), "(age > 30 OR experience > 10)");
    assert!(store.evaluate(&id, &record).unwrap().matched);

    store.modify(&id, "salary < 50000").unwrap();
    assert!(!store.evaluate(&id, &record).unwrap().matched);

    assert!(matches!(
        store.evaluate(&id, &EvaluationContext::new(json!({}))),
        Err(RuleError::EmptyRecord)
    ));
}

#[test]
fn test_user_function_shared_between_parse_and_evaluate() {
    let functions = FunctionRegistry::new();
    functions.register("years_to_retirement", |ctx: &EvaluationContext| {
        let age = ctx
            .get_field("age")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0);
        json!(65.0 - age)
    });

    let store = RuleStore::new(catalog(), functions, &EngineConfig::default());
    let rule = store.create("years_to_retirement < 10").unwrap();

    let record = EvaluationContext::new(json!({ "age": 60 }));
    assert!(store.evaluate(rule.id(), &record).unwrap().matched);

    let record = EvaluationContext::new(json!({ "age": 30 }));
    assert!(!store.evaluate(rule.id(), &record).unwrap().matched);
}
