use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mediflow::flows;
use mediflow::{
    contract_exports, DirectClient, GeminiClient, LoggingConfig, MemoryStore, SessionContext,
};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "mediflow", version, about = "MediFlow CLI", author)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 导出已注册的 Flow 契约
    Contracts {
        #[command(subcommand)]
        command: ContractCommand,
    },
    /// 直连上游模型，绕开契约管线
    Direct {
        /// 发送的原始提示词
        prompt: String,
    },
    /// 调用目录中的某个 Flow
    Invoke {
        /// Flow 名称，例如 mnemonic
        flow: String,
        /// JSON 编码的输入值
        #[arg(long)]
        input: String,
    },
    /// 多轮学习问答，输入 exit 结束
    Chat {
        /// 会话 ID
        #[arg(long, default_value = "cli")]
        session: String,
    },
}

#[derive(Subcommand)]
enum ContractCommand {
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
        /// 单行输出，不做缩进
        #[arg(long)]
        compact: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    LoggingConfig::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Contracts { command } => match command {
            ContractCommand::Export { output, compact } => {
                handle_contract_export(output, compact)?
            }
        },
        Command::Direct { prompt } => handle_direct(prompt).await?,
        Command::Invoke { flow, input } => handle_invoke(flow, input).await?,
        Command::Chat { session } => handle_chat(session).await?,
    }
    Ok(())
}

fn handle_contract_export(output: Option<PathBuf>, compact: bool) -> anyhow::Result<()> {
    let registry = flows::default_registry()?;
    let entries = contract_exports(&registry);
    let value = json!(entries);

    let content = if compact {
        serde_json::to_string(&value)?
    } else {
        serde_json::to_string_pretty(&value)?
    };

    if let Some(path) = output {
        fs::write(&path, content)?;
        println!("Contracts exported to `{}`", path.display());
    } else {
        println!("{content}");
    }
    Ok(())
}

async fn handle_direct(prompt: String) -> anyhow::Result<()> {
    let client = DirectClient::from_env()?;
    let reply = client.call_direct(&prompt).await?;
    println!("{reply}");
    Ok(())
}

async fn handle_invoke(flow: String, input: String) -> anyhow::Result<()> {
    let input: Value = serde_json::from_str(&input)?;
    let model = Arc::new(GeminiClient::from_env()?);
    let unit = flows::unit_by_name(&flow, model)?;
    let output = unit.invoke(input).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn handle_chat(session_id: String) -> anyhow::Result<()> {
    let model = Arc::new(GeminiClient::from_env()?);
    let unit = flows::study_chat_unit(model)?;
    let session = SessionContext::new(session_id, Arc::new(MemoryStore::new()));

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" {
            break;
        }
        match unit
            .invoke_in_session(json!({ "question": question }), &session)
            .await
        {
            Ok(Value::String(text)) => println!("{text}"),
            Ok(other) => println!("{}", serde_json::to_string_pretty(&other)?),
            Err(error) => eprintln!("{error}"),
        }
    }
    Ok(())
}
