use std::sync::Arc;

use mediflow::flows::study_chat_unit;
use mediflow::{DynModelClient, MediFlowError, MessagePart, ModelReply, ScriptedModel};
use serde_json::json;

#[tokio::test]
async fn tool_round_trip_feeds_the_result_back_to_the_model() {
    let scripted = Arc::new(ScriptedModel::new());
    scripted.enqueue(ModelReply::ToolCall {
        name: "term_lookup".to_string(),
        arguments: json!({ "term": "tachycardia" }),
    });
    scripted.enqueue(ModelReply::Text(
        "Tachycardia means a resting rate above 100 bpm.".to_string(),
    ));

    let unit = study_chat_unit(Arc::clone(&scripted) as DynModelClient).expect("unit");
    let output = unit
        .invoke(json!({ "question": "What does tachycardia mean?" }))
        .await
        .expect("invoke");
    assert_eq!(
        output,
        json!("Tachycardia means a resting rate above 100 bpm.")
    );

    let requests = scripted.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 2);
    assert_eq!(requests[0].tools[0].name, "term_lookup");
    assert_eq!(requests[0].tools[1].name, "mnemonic");

    // 第二次请求：用户回合并入会话记录，之后是工具调用与校验过的结果
    let history = &requests[1].history;
    assert_eq!(history.len(), 3);
    assert!(matches!(&history[0].part, MessagePart::Text(text)
        if text.contains("What does tachycardia mean?")));
    assert!(matches!(&history[1].part, MessagePart::ToolCall { name, .. }
        if name == "term_lookup"));
    match &history[2].part {
        MessagePart::ToolResult { name, output } => {
            assert_eq!(name, "term_lookup");
            assert!(output["definition"]
                .as_str()
                .unwrap()
                .contains("100 beats per minute"));
        }
        other => panic!("expected tool result, got {other:?}"),
    }
    assert!(requests[1].prompt.is_empty());
}

#[tokio::test]
async fn unit_backed_tool_runs_the_wrapped_flow() {
    let scripted = Arc::new(ScriptedModel::new());
    scripted.enqueue(ModelReply::ToolCall {
        name: "mnemonic".to_string(),
        arguments: json!({ "topic": "Carpal bones" }),
    });
    // 被包装单元自己的模型调用
    scripted.enqueue(ModelReply::Structured(json!({
        "topicGenerated": "WRONG",
        "mnemonic": "Some Lovers Try Positions That They Can't Handle",
        "explanation": "One word per carpal bone, in order."
    })));
    scripted.enqueue(ModelReply::Text(
        "Try: Some Lovers Try Positions That They Can't Handle.".to_string(),
    ));

    let unit = study_chat_unit(Arc::clone(&scripted) as DynModelClient).expect("unit");
    let output = unit
        .invoke(json!({ "question": "Give me a mnemonic for the carpal bones" }))
        .await
        .expect("invoke");
    assert!(output.as_str().unwrap().contains("Some Lovers"));

    let requests = scripted.requests();
    assert_eq!(requests.len(), 3);
    // 中间的请求来自被包装的 Flow 单元，走它自己的契约管线
    assert!(requests[1].tools.is_empty());
    assert!(requests[1].prompt.contains("\"Carpal bones\""));
    assert!(requests[1].output_schema.is_some());

    // 回填的工具结果已应用回显规则
    match &requests[2].history[2].part {
        MessagePart::ToolResult { name, output } => {
            assert_eq!(name, "mnemonic");
            assert_eq!(output["topicGenerated"], "Carpal bones");
        }
        other => panic!("expected tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_tool_arguments_fail_the_call() {
    let scripted = Arc::new(ScriptedModel::new());
    scripted.enqueue(ModelReply::ToolCall {
        name: "term_lookup".to_string(),
        arguments: json!({ "word": "syncope" }),
    });

    let unit = study_chat_unit(Arc::clone(&scripted) as DynModelClient).expect("unit");
    let err = unit
        .invoke(json!({ "question": "What is syncope?" }))
        .await
        .unwrap_err();
    assert!(matches!(err, MediFlowError::AgentFailure { .. }));
    assert_eq!(scripted.requests().len(), 1);
}

#[tokio::test]
async fn undeclared_tool_request_fails_the_call() {
    let scripted = Arc::new(ScriptedModel::new());
    scripted.enqueue(ModelReply::ToolCall {
        name: "order_labs".to_string(),
        arguments: json!({}),
    });

    let unit = study_chat_unit(Arc::clone(&scripted) as DynModelClient).expect("unit");
    let err = unit
        .invoke(json!({ "question": "Can you order labs?" }))
        .await
        .unwrap_err();
    assert!(matches!(err, MediFlowError::AgentFailure { .. }));
}

#[tokio::test]
async fn tool_round_budget_cuts_off_runaway_exchanges() {
    let scripted = Arc::new(ScriptedModel::new());
    for _ in 0..2 {
        scripted.enqueue(ModelReply::ToolCall {
            name: "term_lookup".to_string(),
            arguments: json!({ "term": "dyspnea" }),
        });
    }

    let unit = study_chat_unit(Arc::clone(&scripted) as DynModelClient)
        .expect("unit")
        .with_max_tool_rounds(1);
    let err = unit
        .invoke(json!({ "question": "Define dyspnea" }))
        .await
        .unwrap_err();
    assert!(matches!(err, MediFlowError::AgentFailure { .. }));
    assert_eq!(scripted.requests().len(), 2);
}

#[tokio::test]
async fn final_reply_must_satisfy_the_output_contract() {
    let scripted = Arc::new(ScriptedModel::new());
    scripted.enqueue(ModelReply::Structured(json!({ "unexpected": "shape" })));

    let unit = study_chat_unit(Arc::clone(&scripted) as DynModelClient).expect("unit");
    let err = unit
        .invoke(json!({ "question": "Anything" }))
        .await
        .unwrap_err();
    assert!(matches!(err, MediFlowError::AgentFailure { .. }));
}

#[tokio::test]
async fn session_context_threads_history_between_turns() {
    use mediflow::{MemoryStore, SessionContext};

    let scripted = Arc::new(ScriptedModel::new());
    scripted.enqueue(ModelReply::Text("There are twelve.".to_string()));
    scripted.enqueue(ModelReply::Text("As noted, twelve.".to_string()));

    let unit = study_chat_unit(Arc::clone(&scripted) as DynModelClient).expect("unit");
    let session = SessionContext::new("s1", Arc::new(MemoryStore::new()));

    unit.invoke_in_session(
        json!({ "question": "How many cranial nerves are there?" }),
        &session,
    )
    .await
    .expect("first turn");
    unit.invoke_in_session(json!({ "question": "Remind me again?" }), &session)
        .await
        .expect("second turn");

    let requests = scripted.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].history.is_empty());
    // 第二轮载入了第一轮的提问与回答
    assert_eq!(requests[1].history.len(), 2);
    assert!(matches!(&requests[1].history[0].part, MessagePart::Text(text)
        if text.contains("How many cranial nerves are there?")));
    assert!(matches!(&requests[1].history[1].part, MessagePart::Text(text)
        if text == "There are twelve."));

    let stored = session.history().await.expect("history");
    assert_eq!(stored.len(), 4);
}

#[tokio::test]
async fn history_from_a_prior_session_is_forwarded() {
    use mediflow::ModelMessage;

    let scripted = Arc::new(ScriptedModel::new());
    scripted.enqueue(ModelReply::Text("As covered earlier, twelve.".to_string()));

    let unit = study_chat_unit(Arc::clone(&scripted) as DynModelClient).expect("unit");
    let earlier = vec![
        ModelMessage::user("How many cranial nerves are there?"),
        ModelMessage::model("There are twelve."),
    ];
    unit.invoke_with_history(json!({ "question": "Remind me again?" }), earlier)
        .await
        .expect("invoke");

    let requests = scripted.requests();
    assert_eq!(requests[0].history.len(), 2);
    assert!(requests[0].prompt.contains("Remind me again?"));
}
