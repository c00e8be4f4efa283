//! コマンドリストの評価: `;`/`&&`/`||` の短絡評価でパイプラインを順に
//! ディスパッチする。
//!
//! 各 [`ListItem`](crate::parser::ListItem) の `connector` は「次のパイプライン
//! との接続」を表す（パーサ側のドキュメント参照）。そのため `run_next` は
//! 現在の項目を実際に実行したかどうかに関係なく、直前の `connector` と直前の
//! 終了ステータスから機械的に算出する — これにより `a && b || c` のような
//! 連鎖が、途中の項目がスキップされた場合でも bash と同じ結果になる。

use crate::launcher;
use crate::parser::{CommandList, Connector};
use crate::shell::Shell;

/// `CommandList` を順に評価し、最後に実行されたパイプラインの終了ステータスを返す。
/// 何も実行されなかった場合（空リスト）は直前のステータスを維持する。
pub fn execute(shell: &mut Shell, list: &CommandList<'_>) -> i32 {
    let mut status = shell.last_status;
    let mut run_next = true;

    for item in &list.items {
        if run_next {
            status = launcher::do_pipeline(shell, &item.pipeline);
        }
        run_next = match item.connector {
            Connector::Seq => true,
            Connector::And => status == 0,
            Connector::Or => status != 0,
        };
    }

    status
}
