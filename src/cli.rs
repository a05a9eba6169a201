//! Interactive terminal client: search, pick a result, pick an action.

use anyhow::Result;
use roonpipe_wire::{Action, PlayRequest, ResultType, SearchResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

use crate::ipc::IpcClient;

pub fn type_marker(result_type: ResultType) -> &'static str {
    match result_type {
        ResultType::Track => "🎵",
        ResultType::Album => "💿",
        ResultType::Artist => "🎤",
        ResultType::Playlist => "📋",
        ResultType::Work => "🎼",
        ResultType::Composer => "👤",
    }
}

pub fn action_marker(title: &str) -> &'static str {
    match title {
        "Play Now" | "Play" => "▶️",
        "Shuffle" => "🔀",
        "Queue" | "Add to Queue" => "📋",
        "Add Next" | "Play From Here" => "⏭️",
        "Start Radio" => "📻",
        _ => "•",
    }
}

/// One result as a menu line
pub fn describe(result: &SearchResult) -> String {
    let mut line = format!("{} {}", type_marker(result.result_type), result.title);
    if !result.subtitle.is_empty() {
        line.push_str(" · ");
        line.push_str(&result.subtitle);
    }
    line
}

pub fn play_request(result: &SearchResult, action: &Action) -> PlayRequest {
    PlayRequest {
        item_key: result.item_key.clone(),
        session_key: result.session_key.clone(),
        category_key: result.category_key.clone(),
        item_index: result.index,
        action_title: action.title.clone(),
    }
}

/// Answer to a numbered menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Pick(usize),
    Back,
    Quit,
    Invalid,
}

impl Choice {
    /// Parse a 1-based pick out of `len` entries. `b`, `n` and an empty
    /// answer go back; `q` quits.
    pub fn parse(input: &str, len: usize) -> Self {
        match input.trim() {
            "q" | "Q" => Self::Quit,
            "" | "b" | "B" | "n" | "N" => Self::Back,
            other => match other.parse::<usize>() {
                Ok(n) if (1..=len).contains(&n) => Self::Pick(n - 1),
                _ => Self::Invalid,
            },
        }
    }
}

/// Prompt loop over any line source and sink
pub struct Prompt<R, W> {
    lines: Lines<R>,
    out: W,
}

impl<R, W> Prompt<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, out: W) -> Self {
        Self {
            lines: input.lines(),
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    async fn say(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }

    /// `None` at end of input
    async fn ask(&mut self, question: &str) -> Result<Option<String>> {
        self.say(question).await?;
        Ok(self.lines.next_line().await?)
    }

    pub async fn run(&mut self, client: &IpcClient) -> Result<()> {
        self.say("\n🎵 RoonPipe Interactive Search\n==============================\n\n")
            .await?;

        loop {
            let query = match self.ask("🔍 Search: ").await? {
                Some(query) => query.trim().to_string(),
                None => break,
            };
            if query.is_empty() || query == "q" {
                break;
            }

            self.say(&format!("\nSearching for \"{}\"...\n\n", query))
                .await?;
            let results = match client.search(&query).await {
                Ok(results) => results,
                Err(e) => {
                    self.say(&format!("❌ Error: {:#}\n\n", e)).await?;
                    continue;
                }
            };
            if results.is_empty() {
                self.say("❌ No results found.\n\n").await?;
                continue;
            }

            let mut menu = format!("Found {} result(s):\n\n", results.len());
            for (i, result) in results.iter().enumerate() {
                menu.push_str(&format!("{:>3}. {}\n", i + 1, describe(result)));
            }
            menu.push_str("  n. 🔍 New search\n  q. ❌ Quit\n\n");
            self.say(&menu).await?;

            let Some(answer) = self.ask("Select an item to play: ").await? else {
                break;
            };
            let selected = match Choice::parse(&answer, results.len()) {
                Choice::Pick(i) => &results[i],
                Choice::Back => continue,
                Choice::Quit => break,
                Choice::Invalid => {
                    self.say("Invalid choice.\n\n").await?;
                    continue;
                }
            };

            if selected.actions.is_empty() {
                self.say("No actions available for this item.\n\n").await?;
                continue;
            }

            let mut menu = String::from("\n");
            for (i, action) in selected.actions.iter().enumerate() {
                menu.push_str(&format!(
                    "{:>3}. {} {}\n",
                    i + 1,
                    action_marker(&action.title),
                    action.title
                ));
            }
            menu.push_str("  b. ← Back\n\n");
            self.say(&menu).await?;

            let Some(answer) = self.ask("What do you want to do? ").await? else {
                break;
            };
            let action = match Choice::parse(&answer, selected.actions.len()) {
                Choice::Pick(i) => &selected.actions[i],
                Choice::Quit => break,
                Choice::Back | Choice::Invalid => continue,
            };

            self.say(&format!("\n{}: {}\n\n", action.title, describe(selected)))
                .await?;
            match client.play(&play_request(selected, action)).await {
                Ok(()) => self.say("✅ Success!\n\n").await?,
                Err(e) => self.say(&format!("❌ Failed: {:#}\n\n", e)).await?,
            }
        }

        self.say("\nGoodbye! 👋\n\n").await
    }
}

/// Run the interactive client on the terminal.
pub async fn run(client: IpcClient) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    Prompt::new(stdin, tokio::io::stdout()).run(&client).await
}
