// Flows 模块 - 内置的医学学习流程目录

use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::{MediFlowError, Result};
use crate::flow::{ContractRegistry, FlowSpec, FlowUnit, OutputRule};
use crate::model::DynModelClient;
use crate::pipeline::{first_match, DynInvokable, Pipeline, PipelineRun, PipelineStep};
use crate::schema::Schema;
use crate::tools::{handler_from_fn, ChatUnit, ToolSpec};

pub const MNEMONIC: &str = "mnemonic";
pub const SYMPTOM_ANALYSIS: &str = "symptom_analysis";
pub const ESCALATION: &str = "escalation";
pub const STUDY_CHAT: &str = "study_chat";
pub const TRIAGE: &str = "triage";

const MNEMONIC_TEMPLATE: &str = "\
You are a medical education assistant helping students memorize clinical material.

Create a mnemonic for the topic \"{{topic}}\".
{{#if count}}It should cover exactly {{count}} items.
{{/if}}
Respond with the mnemonic sentence and a short explanation of how it maps
to the items, in order.";

const SYMPTOM_ANALYSIS_TEMPLATE: &str = "\
You are assisting a medical student with a differential diagnosis exercise.

Reported symptoms:
{{#each symptoms}}- {{this}}
{{/each}}
{{#if patientContext}}Patient context: {{patientContext}}
{{/if}}
List plausible diagnoses, each with a likelihood tier and a short rationale.";

const ESCALATION_TEMPLATE: &str = "\
A differential diagnosis exercise flagged \"{{diagnosis}}\" ({{tier}} likelihood) based on:
{{#each symptoms}}- {{this}}
{{/each}}
Recommend next study steps and how urgently a clinician should review this case.";

const STUDY_CHAT_TEMPLATE: &str = "\
You are a study companion for medical students. Answer concisely and name the
relevant system or mechanism. Use the term_lookup tool when a precise
definition would help, and the mnemonic tool when the student asks for a
memory aid.

Question: {{question}}";

/// 记忆口诀生成
///
/// topicGenerated 总是回显输入的 topic，mnemonic 必须非空。
pub fn mnemonic_spec() -> Result<FlowSpec> {
    let input = Schema::object(
        [
            ("topic", Schema::string()),
            ("count", Schema::integer()),
        ],
        &["topic"],
    );
    let output = Schema::object(
        [
            ("topicGenerated", Schema::string()),
            ("mnemonic", Schema::string()),
            ("explanation", Schema::string()),
        ],
        &["topicGenerated", "mnemonic", "explanation"],
    );
    Ok(FlowSpec::new(MNEMONIC, input, output, MNEMONIC_TEMPLATE)?.with_temperature(0.8))
}

pub fn mnemonic_unit(model: DynModelClient) -> Result<FlowUnit> {
    Ok(FlowUnit::new(Arc::new(mnemonic_spec()?), model)?
        .with_rule(OutputRule::EchoInput {
            output_field: "topicGenerated".to_string(),
            input_field: "topic".to_string(),
        })
        .with_rule(OutputRule::NonEmpty {
            field: "mnemonic".to_string(),
        })
        .with_failure_message("Unable to build a mnemonic right now. Please try again."))
}

/// 症状分析：给出分级的鉴别诊断列表
pub fn symptom_analysis_spec() -> Result<FlowSpec> {
    let diagnosis = Schema::object(
        [
            ("name", Schema::string()),
            ("tier", Schema::enumeration(["Low", "Medium", "High"])),
            ("rationale", Schema::string()),
        ],
        &["name", "tier", "rationale"],
    );
    let input = Schema::object(
        [
            ("symptoms", Schema::array(Schema::string())),
            ("patientContext", Schema::string()),
        ],
        &["symptoms"],
    );
    let output = Schema::object([("diagnoses", Schema::array(diagnosis))], &["diagnoses"]);
    Ok(FlowSpec::new(SYMPTOM_ANALYSIS, input, output, SYMPTOM_ANALYSIS_TEMPLATE)?
        .with_temperature(0.2))
}

pub fn symptom_analysis_unit(model: DynModelClient) -> Result<FlowUnit> {
    Ok(FlowUnit::new(Arc::new(symptom_analysis_spec()?), model)?
        .with_rule(OutputRule::NonEmpty {
            field: "diagnoses".to_string(),
        })
        .with_failure_message(
            "Unable to analyze those symptoms right now. Please try again.",
        ))
}

/// 升级建议：针对单个高风险诊断给出复核紧迫度
pub fn escalation_spec() -> Result<FlowSpec> {
    let input = Schema::object(
        [
            ("diagnosis", Schema::string()),
            ("tier", Schema::enumeration(["Low", "Medium", "High"])),
            ("symptoms", Schema::array(Schema::string())),
        ],
        &["diagnosis", "tier"],
    );
    let output = Schema::object(
        [
            ("recommendation", Schema::string()),
            ("urgency", Schema::enumeration(["Routine", "Soon", "Immediate"])),
        ],
        &["recommendation", "urgency"],
    );
    Ok(FlowSpec::new(ESCALATION, input, output, ESCALATION_TEMPLATE)?.with_temperature(0.3))
}

pub fn escalation_unit(model: DynModelClient) -> Result<FlowUnit> {
    Ok(FlowUnit::new(Arc::new(escalation_spec()?), model)?
        .with_rule(OutputRule::NonEmpty {
            field: "recommendation".to_string(),
        })
        .with_failure_message(
            "Unable to prepare an escalation recommendation right now. Please try again.",
        ))
}

/// 学习问答：自由文本回复，可调用术语查询工具
pub fn study_chat_spec() -> Result<FlowSpec> {
    let input = Schema::object([("question", Schema::string())], &["question"]);
    let output = Schema::string();
    Ok(FlowSpec::new(STUDY_CHAT, input, output, STUDY_CHAT_TEMPLATE)?.with_temperature(0.6))
}

pub fn study_chat_unit(model: DynModelClient) -> Result<ChatUnit> {
    let mnemonic = Arc::new(mnemonic_unit(Arc::clone(&model))?);
    Ok(ChatUnit::new(Arc::new(study_chat_spec()?), model)?
        .with_tool(term_lookup_tool())
        .with_tool(ToolSpec::from_unit(
            mnemonic,
            "Generate a memory mnemonic for a named medical topic",
        ))
        .with_failure_message("I hit a snag answering that. Please try again."))
}

/// 内置术语查询工具
pub fn term_lookup_tool() -> ToolSpec {
    ToolSpec::new(
        "term_lookup",
        "Look up the definition of a clinical term",
        Schema::object([("term", Schema::string())], &["term"]),
        Schema::object([("definition", Schema::string())], &["definition"]),
        handler_from_fn(|arguments| async move {
            let term = arguments
                .get("term")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(json!({ "definition": define_term(term) }))
        }),
    )
}

fn define_term(term: &str) -> String {
    let definition = match term.trim().to_ascii_lowercase().as_str() {
        "tachycardia" => "A resting heart rate above 100 beats per minute.",
        "bradycardia" => "A resting heart rate below 60 beats per minute.",
        "syncope" => "A transient loss of consciousness from reduced cerebral perfusion.",
        "dyspnea" => "The subjective sensation of difficult or labored breathing.",
        "hemoptysis" => "Coughing up blood originating from the respiratory tract.",
        _ => return format!("No glossary entry for \"{term}\"."),
    };
    definition.to_string()
}

/// 注册全部内置契约
pub fn default_registry() -> Result<ContractRegistry> {
    let mut registry = ContractRegistry::new();
    registry.register(mnemonic_spec()?)?;
    registry.register(symptom_analysis_spec()?)?;
    registry.register(escalation_spec()?)?;
    registry.register(study_chat_spec()?)?;
    Ok(registry)
}

/// 按名称构建目录里的执行单元
pub fn unit_by_name(name: &str, model: DynModelClient) -> Result<DynInvokable> {
    match name {
        MNEMONIC => Ok(Arc::new(mnemonic_unit(model)?)),
        SYMPTOM_ANALYSIS => Ok(Arc::new(symptom_analysis_unit(model)?)),
        ESCALATION => Ok(Arc::new(escalation_unit(model)?)),
        STUDY_CHAT => Ok(Arc::new(study_chat_unit(model)?)),
        other => Err(MediFlowError::UnknownFlow(other.to_string())),
    }
}

/// 分诊管线：症状分析总是执行；出现高风险诊断时追加升级建议
///
/// 升级一步只取数组顺序中第一个 High 诊断。
pub fn triage_pipeline(model: DynModelClient) -> Result<Pipeline> {
    let analysis = symptom_analysis_unit(Arc::clone(&model))?;
    let escalation = escalation_unit(model)?;

    Ok(Pipeline::new(TRIAGE)
        .step(PipelineStep::new(Arc::new(analysis)))
        .step(
            PipelineStep::new(Arc::new(escalation))
                .with_gate(|run| first_high_diagnosis(run).is_some())
                .with_derive(|run| {
                    let hit = first_high_diagnosis(run);
                    json!({
                        "diagnosis": hit
                            .and_then(|d| d.get("name"))
                            .cloned()
                            .unwrap_or_default(),
                        "tier": hit
                            .and_then(|d| d.get("tier"))
                            .cloned()
                            .unwrap_or_default(),
                        "symptoms": run
                            .input()
                            .get("symptoms")
                            .cloned()
                            .unwrap_or_else(|| json!([])),
                    })
                }),
        ))
}

fn first_high_diagnosis(run: &PipelineRun) -> Option<&Value> {
    let diagnoses = run.get(SYMPTOM_ANALYSIS)?.get("diagnoses")?;
    first_match(diagnoses, |diagnosis| diagnosis["tier"] == "High")
}
