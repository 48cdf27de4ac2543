use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stepplan::prelude::*;
use stepplan::{FunctionOutput, FunctionView, InvokeSettings, PlanError};

/// Records every invocation and answers with `<input>|<name>`, after
/// failing the first `failures` calls
struct Echo {
    name: &'static str,
    log: Arc<Mutex<Vec<(String, Variables)>>>,
    failures: AtomicUsize,
}

#[derive(Debug, thiserror::Error)]
#[error("{0} is unavailable")]
struct Unavailable(&'static str);

#[async_trait]
impl Function for Echo {
    fn describe(&self) -> FunctionView {
        FunctionView::new("journal", self.name)
    }

    async fn invoke(
        &self,
        variables: Variables,
        _settings: Option<&InvokeSettings>,
        _cancellation: CancellationToken,
    ) -> Result<FunctionOutput> {
        self.log
            .lock()
            .unwrap()
            .push((self.name.to_string(), variables.clone()));
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(Unavailable(self.name).into());
        }
        let value = format!("{}|{}", variables.input(), self.name);
        let mut updated = variables;
        updated.set("scratch", "internal");
        Ok(FunctionOutput::new(value, updated))
    }
}

#[derive(Default, Clone)]
struct Journal(Arc<Mutex<Vec<(String, Variables)>>>);

impl Journal {
    fn echo(&self, name: &'static str) -> Arc<dyn Function> {
        self.failing(name, 0)
    }

    fn failing(&self, name: &'static str, failures: usize) -> Arc<dyn Function> {
        Arc::new(Echo {
            name,
            log: self.0.clone(),
            failures: AtomicUsize::new(failures),
        })
    }

    fn names(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    fn call(&self, index: usize) -> Variables {
        self.0.lock().unwrap()[index].1.clone()
    }
}

#[tokio::test]
async fn test_leaf_threading() {
    let journal = Journal::default();
    let mut plan = Plan::with_steps("two leaves", [journal.echo("l1"), journal.echo("l2")]);
    let mut ctx = ExecutionContext::with_input("X");

    let result = plan.invoke(&mut ctx).await.unwrap();

    assert_eq!(journal.call(0).input(), "X");
    assert_eq!(journal.call(1).input(), "X|l1");
    assert_eq!(result.value(), Some("X|l1|l2"));
}

#[tokio::test]
async fn test_parameter_state_override_precedence() {
    let journal = Journal::default();
    let overrides = || {
        ExecutionContext::new(Variables::from([("INPUT", "x"), ("type", "limerick")]))
    };

    let mut plan = Plan::from_function(journal.echo("both"))
        .with_parameter("type", "joke")
        .with_state("type", "poem");
    plan.invoke(&mut overrides()).await.unwrap();
    assert_eq!(journal.call(0).get("type"), Some("joke"));

    let mut plan = Plan::from_function(journal.echo("state_only")).with_state("type", "poem");
    plan.invoke(&mut overrides()).await.unwrap();
    assert_eq!(journal.call(1).get("type"), Some("poem"));

    let mut plan = Plan::from_function(journal.echo("override_only"));
    plan.invoke(&mut overrides()).await.unwrap();
    assert_eq!(journal.call(2).get("type"), Some("limerick"));
}

#[tokio::test]
async fn test_substitution_leaves_unknown_tokens() {
    let journal = Journal::default();
    let mut plan = Plan::from_function(journal.echo("format"))
        .with_parameter(
            "payload",
            r#"{"prop":"value", "$prop": 3, "prop2": "my name is $pop and $var"}"#,
        )
        .with_state("var", "foobar");

    plan.invoke(&mut ExecutionContext::default()).await.unwrap();

    assert_eq!(
        journal.call(0).get("payload"),
        Some(r#"{"prop":"value", "$prop": 3, "prop2": "my name is $pop and foobar"}"#)
    );
}

#[tokio::test]
async fn test_depth_first_order_over_nested_tree() {
    let journal = Journal::default();
    let mut plan = Plan::with_steps(
        "nested",
        [
            Plan::with_steps(
                "inner",
                [journal.echo("c1"), journal.echo("c2"), journal.echo("c3")],
            ),
            Plan::from_function(journal.echo("n1")),
        ],
    );
    let executor = PlanExecutor::new();
    let mut ctx = ExecutionContext::with_input("x");

    let mut steps = 0;
    while executor.has_next_step(&plan) {
        executor.step(&mut ctx, &mut plan).await.unwrap();
        steps += 1;
    }

    assert_eq!(steps, 4);
    assert_eq!(journal.names(), vec!["c1", "c2", "c3", "n1"]);
    assert_eq!(journal.call(1).input(), "x|c1");
    assert_eq!(journal.call(2).input(), "x|c1|c2");
    assert_eq!(journal.call(3).input(), "x|c1|c2|c3");
    assert_eq!(plan.last_result(), Some("x|c1|c2|c3|n1"));
}

#[tokio::test]
async fn test_only_declared_outputs_are_retrievable() {
    let journal = Journal::default();
    let mut plan = Plan::with_steps(
        "story",
        [
            Plan::from_function(journal.echo("synopsis")),
            Plan::from_function(journal.echo("chapter")).with_output("chapter"),
        ],
    )
    .with_output("story");

    let result = plan.invoke(&mut ExecutionContext::with_input("idea")).await.unwrap();

    assert_eq!(result.try_get_output("chapter"), Some("idea|synopsis|chapter"));
    assert_eq!(result.try_get_output("story"), Some("idea|synopsis|chapter"));
    assert_eq!(result.try_get_output("synopsis"), None);
    assert_eq!(result.try_get_output("scratch"), None);
    assert_eq!(result.outputs().count(), 2);
}

#[tokio::test]
async fn test_failure_stops_before_second_leaf() {
    let journal = Journal::default();
    let mut plan = Plan::with_steps(
        "doomed",
        [journal.failing("first", usize::MAX), journal.echo("second")],
    );
    let mut ctx = ExecutionContext::with_input("x");

    let err = plan.invoke(&mut ctx).await.unwrap_err();

    assert_eq!(journal.names(), vec!["first"]);
    assert!(matches!(err.downcast_ref::<Unavailable>(), Some(Unavailable("first"))));
    assert!(plan.has_next_step());
    assert_eq!(plan.last_result(), None);
    assert_eq!(ctx.count_steps(StepStatus::Failed), 1);
    assert_eq!(ctx.variables.input(), "x");
}

#[tokio::test]
async fn test_sub_plans_stay_nested() {
    let journal = Journal::default();
    let mut plan = Plan::new("grow");
    plan.add_steps([Plan::with_steps("branch", [journal.echo("a"), journal.echo("b")])])
        .unwrap();
    plan.add_steps([journal.echo("c")]).unwrap();

    let root = plan.root_node();
    assert_eq!(root.children().len(), 2);
    assert!(plan.try_node(root.children()[0]).unwrap().is_composite());
    assert_eq!(plan.leaf_count(), 3);

    let mut leaf = Plan::from_function(journal.echo("solo"));
    assert!(matches!(
        leaf.add_steps([journal.echo("d")]),
        Err(PlanError::MixedNode { .. })
    ));
}

#[tokio::test]
async fn test_composite_input_seeds_only_its_first_leaf() {
    let journal = Journal::default();
    let mut plan = Plan::with_steps(
        "seeded",
        [
            Plan::with_steps("inner", [journal.echo("c1"), journal.echo("c2")])
                .with_parameter("INPUT", "seed"),
            Plan::from_function(journal.echo("n1")),
        ],
    );

    let result = plan.invoke(&mut ExecutionContext::with_input("x")).await.unwrap();

    assert_eq!(journal.call(0).input(), "seed");
    assert_eq!(journal.call(1).input(), "seed|c1");
    assert_eq!(journal.call(2).input(), "seed|c1|c2");
    assert_eq!(result.value(), Some("seed|c1|c2|n1"));
}

#[tokio::test]
async fn test_empty_result_is_threaded() {
    let journal = Journal::default();
    let blank = NativeFunction::new("text", "blank", |_vars: Variables| async move {
        Ok(String::new())
    })
    .shared();
    let mut plan = Plan::with_steps(
        "blank first",
        [Plan::from_function(blank), Plan::from_function(journal.echo("b"))],
    )
    .with_state("INPUT", "stale");

    let result = plan.invoke(&mut ExecutionContext::with_input("x")).await.unwrap();

    assert_eq!(journal.call(0).input(), "");
    assert_eq!(result.value(), Some("|b"));
}

#[tokio::test]
async fn test_output_feeds_later_parameter() {
    let journal = Journal::default();
    let mut plan = Plan::with_steps(
        "chain",
        [
            Plan::from_function(journal.echo("a")).with_output("draft"),
            Plan::from_function(journal.echo("b")).with_parameter("note", "from $draft"),
        ],
    );

    plan.invoke(&mut ExecutionContext::with_input("x")).await.unwrap();

    assert_eq!(journal.call(1).get("note"), Some("from x|a"));
    assert_eq!(journal.call(1).get("draft"), Some("x|a"));
}

#[tokio::test]
async fn test_resume_uses_new_overrides_only_for_unresolved_names() {
    let journal = Journal::default();
    let mut plan = Plan::with_steps(
        "resume",
        [
            Plan::from_function(journal.echo("a")).with_output("draft"),
            Plan::from_function(journal.failing("flaky", 1)).with_parameter("note", "$draft/$tone"),
            Plan::from_function(journal.echo("c")),
        ],
    );

    let mut first = ExecutionContext::new(Variables::from([("INPUT", "x"), ("tone", "dry")]));
    let err = plan.invoke(&mut first).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<Unavailable>(), Some(Unavailable("flaky"))));
    assert_eq!(journal.call(1).get("note"), Some("x|a/dry"));

    let mut second = ExecutionContext::new(Variables::from([
        ("INPUT", "y"),
        ("tone", "wry"),
        ("draft", "override-draft"),
    ]));
    let result = plan.invoke(&mut second).await.unwrap();

    assert_eq!(journal.names(), vec!["a", "flaky", "flaky", "c"]);
    let retried = journal.call(2);
    assert_eq!(retried.input(), "x|a");
    assert_eq!(retried.get("draft"), Some("x|a"));
    assert_eq!(retried.get("tone"), Some("wry"));
    assert_eq!(retried.get("note"), Some("x|a/wry"));
    assert_eq!(result.value(), Some("x|a|flaky|c"));
}
