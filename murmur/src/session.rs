use futures::StreamExt;
use murmur_client::{MurmurClient, ResponseRecord};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};

/// A line typed at the interactive prompt
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Empty,
    Quit,
    Reset,
    Models,
    /// Show (`None`) or switch the active model
    Model(Option<&'a str>),
    Help,
    Prompt(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();

        let Some(rest) = line.strip_prefix('/') else {
            return if line.is_empty() { Self::Empty } else { Self::Prompt(line) };
        };

        let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let arg = arg.trim();

        match name {
            "quit" | "exit" => Self::Quit,
            "reset" => Self::Reset,
            "models" => Self::Models,
            "model" => Self::Model((!arg.is_empty()).then_some(arg)),
            "help" => Self::Help,
            // Unknown commands go to the model verbatim
            _ => Self::Prompt(line),
        }
    }
}

const HELP: &str = "\
/reset          start a new conversation
/model [name]   show or switch the active model
/models         list models installed on the server
/quit           exit
Ctrl+C cancels the answer in progress.";

/// Send one prompt and write the answer to stdout
pub async fn ask(client: &MurmurClient, prompt: &str, stream: bool) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();

    if stream {
        let mut records = client.generate_streaming_response(prompt).await?;
        while let Some(record) = records.next().await {
            let record = record?;
            stdout.write_all(record.response.as_bytes()).await?;
            stdout.flush().await?;

            if record.done {
                log_usage(&record);
            }
        }
    } else {
        let text = client.get_response(prompt).await?;
        stdout.write_all(text.as_bytes()).await?;
    }

    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Read prompts from stdin until EOF, `/quit` or Ctrl+C, keeping one conversation
pub async fn interactive(client: MurmurClient, stream: bool) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    run(client, stdin, stream, || async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await
}

/// Chat loop over any line source
///
/// `interrupted` resolves on each user interrupt. While an answer is in
/// progress it cancels the answer; at the prompt it ends the session.
async fn run<R, F, Fut>(mut client: MurmurClient, input: R, stream: bool, mut interrupted: F) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut lines = input.lines();

    eprintln!("murmur: chatting with {} (/help for commands)", client.active_model());

    loop {
        eprint!("> ");
        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = interrupted() => {
                eprintln!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        match Command::parse(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => eprintln!("{HELP}"),
            Command::Reset => {
                client.clear_context();
                eprintln!("(new conversation)");
            }
            Command::Model(None) => eprintln!("{}", client.active_model()),
            Command::Model(Some(model)) => {
                client.set_active_model(model);
                eprintln!("(switched to {model})");
            }
            Command::Models => match client.list_models().await {
                Ok(models) => {
                    for model in models {
                        eprintln!("{}", model.name);
                    }
                }
                Err(e) => eprintln!("error: {e}"),
            },
            Command::Prompt(prompt) => {
                tokio::select! {
                    result = ask(&client, prompt, stream) => {
                        if let Err(e) = result {
                            eprintln!("\nerror: {e:#}");
                        }
                    }
                    () = interrupted() => eprintln!("\n(cancelled)"),
                }
            }
        }
    }

    Ok(())
}

fn log_usage(record: &ResponseRecord) {
    let metadata = &record.metadata;
    tracing::info!(
        model = %record.model,
        done_reason = metadata.done_reason.as_deref().unwrap_or("unknown"),
        eval_count = metadata.eval_count,
        tokens_per_second = metadata.tokens_per_second(),
        total_secs = metadata.total().map(|d| d.as_secs_f64()),
        "generation finished"
    );
}
