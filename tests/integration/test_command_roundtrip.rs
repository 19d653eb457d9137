//! Integration Tests for Command/Response Round Trips
//!
//! These tests drive a multiplexer against a scripted shell on the far end
//! of an in-process duplex transport.

use std::time::Duration;

use shellmux::{MuxConfig, ShellMultiplexer};

#[path = "../test_utils/mock_transport.rs"]
mod mock_transport;
use mock_transport::FakeShell;

#[tokio::test]
async fn test_single_command_end_to_end() {
    let (mut shell, peer) = FakeShell::new();
    let (commands, mut blocks) = ShellMultiplexer::new(MuxConfig::default())
        .attach(peer)
        .unwrap();

    commands.submit("ls").await.unwrap();
    shell.expect_command("ls").await;

    shell
        .answer("total 0\ndrwxr-xr-x 2 root root 40 Aug 21 10:00 .\n", "sh-4.3$ ")
        .await;

    let block = blocks.recv().await.unwrap().unwrap();
    let text = block.text();
    assert!(text.starts_with("total 0\n"), "listing should open the block");
    assert!(text.ends_with("sh-4.3$ "), "prompt should close the block");

    // The turn freed up with the block; the next command goes straight out.
    commands.submit("pwd").await.unwrap();
    shell.expect_command("pwd").await;
}

#[tokio::test]
async fn test_multi_line_output_is_one_block() {
    let (mut shell, peer) = FakeShell::new();
    let (commands, mut blocks) = ShellMultiplexer::new(MuxConfig::default())
        .attach(peer)
        .unwrap();

    commands.submit("cat notes").await.unwrap();
    shell.expect_command("cat notes").await;

    // Lines land in separate writes; nothing before the prompt ends a frame.
    shell.feed(b"foo\n").await;
    shell.feed(b"bar\n").await;
    shell.feed(b"sh-4.3$ ").await;

    let block = blocks.recv().await.unwrap().unwrap();
    assert_eq!(block.data, b"foo\nbar\nsh-4.3$ ");
}

#[tokio::test]
async fn test_prompt_split_across_reads() {
    let (mut shell, peer) = FakeShell::new();
    let (commands, mut blocks) = ShellMultiplexer::new(MuxConfig::default())
        .attach(peer)
        .unwrap();

    commands.submit("true").await.unwrap();
    shell.expect_command("true").await;

    // The prompt tail itself straddles a read boundary.
    shell.feed(b"done\nsh-4.3$").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(
        blocks.try_recv().unwrap().is_none(),
        "half a prompt must not frame"
    );

    shell.feed(b" ").await;
    let block = blocks.recv().await.unwrap().unwrap();
    assert_eq!(block.data, b"done\nsh-4.3$ ");
}

#[tokio::test]
async fn test_greeting_block_before_first_command() {
    let (mut shell, peer) = FakeShell::new();
    let (commands, mut blocks) = ShellMultiplexer::new(MuxConfig::default())
        .attach(peer)
        .unwrap();

    // A login shell prints its banner and first prompt unprompted.
    shell.feed(b"Welcome to box\nsh-4.3$ ").await;
    let greeting = blocks.recv().await.unwrap().unwrap();
    assert_eq!(greeting.data, b"Welcome to box\nsh-4.3$ ");

    // The greeting consumed no turn; command flow is unaffected.
    commands.submit("ls").await.unwrap();
    shell.expect_command("ls").await;
    shell.answer("total 0\n", "sh-4.3$ ").await;
    let block = blocks.recv().await.unwrap().unwrap();
    assert!(block.text().contains("total 0"));
}

#[tokio::test]
async fn test_sequential_commands_keep_order() {
    let (mut shell, peer) = FakeShell::new();
    let (commands, mut blocks) = ShellMultiplexer::new(MuxConfig::default())
        .attach(peer)
        .unwrap();

    // Queue both up front; the second waits for the first's prompt.
    commands.submit("first").await.unwrap();
    commands.submit("second").await.unwrap();

    shell.expect_command("first").await;
    shell.answer("one\n", "sh-4.3$ ").await;

    shell.expect_command("second").await;
    shell.answer("two\n", "sh-4.3$ ").await;

    // Each block holds exactly one response; no bleed between turns.
    let block = blocks.recv().await.unwrap().unwrap();
    assert_eq!(block.data, b"one\nsh-4.3$ ");
    let block = blocks.recv().await.unwrap().unwrap();
    assert_eq!(block.data, b"two\nsh-4.3$ ");
}

#[tokio::test]
async fn test_prompt_only_response_is_an_empty_body_block() {
    let (mut shell, peer) = FakeShell::new();
    let (commands, mut blocks) = ShellMultiplexer::new(MuxConfig::default())
        .attach(peer)
        .unwrap();

    commands.submit("true").await.unwrap();
    shell.expect_command("true").await;

    shell.feed(b"sh-4.3$ ").await;
    let block = blocks.recv().await.unwrap().unwrap();
    assert_eq!(block.data, b"sh-4.3$ ");
}
