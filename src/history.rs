//! コマンド履歴の永続化。
//!
//! `~/.jsh_history` にプレーンテキスト（1 行 1 コマンド）で永続化し、起動時に
//! 読み込む。カノニカルモードの行リーダー ([`crate::line_reader`]) には
//! ↑↓キーでのナビゲーション手段がないため、ここでは追記・重複排除・上限
//! 管理のみを提供する。
//!
//! ## ファイル形式
//!
//! - パス: `$HOME/.jsh_history`（`$HOME` 未設定時は `/tmp/.jsh_history`）
//! - 書き込み: 追記モード（[`OpenOptions::append`]）で 1 コマンドずつ追記
//! - 最大エントリ数: 1000（超過時は古いエントリから削除）
//! - 直前と同一のコマンドは追加しない（連続重複排除）

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

/// コマンド履歴。
pub struct History {
    /// 履歴エントリのリスト（古い順）。
    entries: Vec<String>,
    /// 保持する最大エントリ数。
    max_size: usize,
    /// 履歴ファイルのパス（`~/.jsh_history`）。
    path: PathBuf,
}

impl History {
    /// 新しい `History` を作成し、`~/.jsh_history` から既存エントリを読み込む。
    pub fn new() -> Self {
        let path = std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join(".jsh_history");
        let mut h = Self {
            entries: Vec::new(),
            max_size: 1000,
            path,
        };
        h.load();
        h
    }

    /// 履歴ファイルからエントリを読み込む。ファイルが存在しなければ何もしない。
    fn load(&mut self) {
        if let Ok(file) = fs::File::open(&self.path) {
            let reader = BufReader::new(file);
            for line in reader.lines().flatten() {
                if !line.is_empty() {
                    self.entries.push(line);
                }
            }
            if self.entries.len() > self.max_size {
                let start = self.entries.len() - self.max_size;
                self.entries = self.entries[start..].to_vec();
            }
        }
    }

    /// エントリ追加 + ファイル追記。空行・直前との重複はスキップ。
    pub fn add(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if self.entries.last().map_or(false, |last| last == line) {
            return;
        }
        self.entries.push(line.to_string());
        if self.entries.len() > self.max_size {
            self.entries.remove(0);
        }
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(file, "{}", line);
        }
    }
}
