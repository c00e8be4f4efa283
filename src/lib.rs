//! jsh ライブラリ — ベンチマーク・テスト用にモジュールを公開する。
//!
//! バイナリ本体は `main.rs` の REPL ループ。
//! この `lib.rs` は `benches/bench_main.rs` 等の外部クレートから
//! パーサー・ビルトイン・ジョブ制御機能に直接アクセスするために存在する。
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`history`] | コマンド履歴（`~/.jsh_history` 永続化、重複排除、上限管理） |
//! | [`parser`] | 構文解析（コマンドリスト `&&`/`||`/`;`、パイプライン、リダイレクト、クォート、エスケープ、変数展開 `$VAR`/`${VAR}`/`$?`、`&`） |
//! | [`line_reader`] | カノニカルモード端末からの 1 行読み取り（`read(2)` ブロッキング） |
//! | [`executor`] | コマンドリストの評価（`&&`/`||`/`;` の短絡、パイプラインディスパッチ） |
//! | [`launcher`] | ジョブ起動（fork/execvp、リダイレクト解決、パイプライン配線、プロセスグループ形成） |
//! | [`monitor`] | フォアグラウンドモニタ（フォアグラウンドジョブの完了/停止待ち） |
//! | [`ops`] | ジョブ制御操作（`jobs`/`fg`/`bg`/`kill` の実処理、シェル終了時のジョブ掃除） |
//! | [`builtins`] | ビルトイン（`exit`, `cd`, `pwd`, `echo`, `export`, `unset`, `jobs`, `fg`, `bg`, `kill`） |
//! | [`glob`] | パス名展開（`*`, `?` によるファイル名マッチング） |
//! | [`job`] | ジョブテーブル（プロセス状態集約、スロット管理） |
//! | [`reaper`] | 子プロセス回収（SIGCHLD ハンドラ、`waitpid(WNOHANG)` ループ） |
//! | [`signals`] | シグナル配線（SIGCHLD/SIGINT/SIGTSTP/SIGTTIN/SIGTTOU の設定、ブロック区間の RAII ガード） |
//! | [`terminal`] | 端末コントローラ（制御端末の fd、フォアグラウンドプロセスグループの設定、termios 保存/復元） |
//! | [`shell`] | シェルのグローバル状態（終了ステータス、ジョブテーブル、プロセスグループ、端末、履歴） |
//! | [`spawn`] | `execvp` ラッパー（CString 配列の構築、exec 失敗時のエラーコード変換） |

pub mod builtins;
pub mod executor;
pub mod glob;
pub mod history;
pub mod job;
pub mod launcher;
pub mod line_reader;
pub mod monitor;
pub mod ops;
pub mod parser;
pub mod reaper;
pub mod shell;
pub mod signals;
pub mod spawn;
pub mod terminal;
