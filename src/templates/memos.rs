//! Memo list page.
//!
//! Memos live in the browser's local storage, so the page is a static shell
//! and the script does the work: list newest first, edit, delete and undo
//! with the same command semantics as the `memo` module.

use serde::Serialize;

use crate::memo::{MAX_HISTORY, MEMOS_KEY};

use super::components::base_html;
use super::viewer::script_json;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemoPageConfig {
    memos_key: &'static str,
    max_history: usize,
}

pub fn render_memos_page() -> String {
    let body = r#"<div class="memo-page">
    <header class="top-bar">
        <h1>Memos</h1>
        <a href="/">Back to viewer</a>
    </header>
    <div class="memo-toolbar">
        <button id="addMemoBtn">Add memo</button>
        <button id="undoMemoBtn" disabled>Undo</button>
    </div>
    <div id="memoList"></div>
</div>"#;

    let config = MemoPageConfig {
        memos_key: MEMOS_KEY,
        max_history: MAX_HISTORY,
    };
    let scripts = format!(
        "<script>window.MDVIEW_MEMOS = {};</script>\n<script>{}</script>",
        script_json(&config),
        MEMOS_JS
    );

    base_html("Memos", body, &scripts)
}

const MEMOS_JS: &str = r##"
(function () {
  const cfg = window.MDVIEW_MEMOS;
  const list = document.getElementById('memoList');
  const undoBtn = document.getElementById('undoMemoBtn');
  const history = [];

  function read() {
    try {
      return JSON.parse(localStorage.getItem(cfg.memosKey) || '[]');
    } catch (err) {
      console.error('Error reading memos from storage:', err);
      return [];
    }
  }

  function write(memos) {
    localStorage.setItem(cfg.memosKey, JSON.stringify(memos));
  }

  // Commands capture what they overwrite so they can be inverted.
  const commands = {
    add(memo) {
      return {
        apply(memos) { memos.push(memo); },
        invert(memos) {
          for (let i = memos.length - 1; i >= 0; i--) {
            if (memos[i].id === memo.id) { memos.splice(i, 1); return true; }
          }
          return false;
        }
      };
    },
    edit(index, content) {
      let previous = null;
      return {
        apply(memos) {
          const memo = memos[index];
          if (!memo) throw new Error('memo index ' + index + ' out of range');
          previous = { content: memo.content, timestamp: memo.timestamp };
          memo.content = content;
          memo.timestamp = new Date().toISOString();
        },
        invert(memos) {
          if (!previous || !memos[index]) return false;
          memos[index].content = previous.content;
          memos[index].timestamp = previous.timestamp;
          return true;
        }
      };
    },
    remove(index) {
      let removed = null;
      return {
        apply(memos) {
          if (index >= memos.length) throw new Error('memo index ' + index + ' out of range');
          removed = memos.splice(index, 1)[0];
        },
        invert(memos) {
          if (!removed) return false;
          memos.splice(Math.min(index, memos.length), 0, removed);
          return true;
        }
      };
    }
  };

  function execute(command) {
    const memos = read();
    try {
      command.apply(memos);
      write(memos);
    } catch (err) {
      console.error('Memo change failed:', err);
      alert(err.message);
      return;
    }
    history.push(command);
    if (history.length > cfg.maxHistory) history.shift();
    render();
  }

  function undo() {
    const command = history.pop();
    if (!command) return;
    const memos = read();
    if (command.invert(memos)) write(memos);
    render();
  }

  function render() {
    undoBtn.disabled = history.length === 0;
    const memos = read().map((memo, index) => ({ memo, index }));
    list.innerHTML = '';
    if (memos.length === 0) {
      const empty = document.createElement('p');
      empty.className = 'memo-empty-message';
      empty.textContent = 'No memos yet.';
      list.appendChild(empty);
      return;
    }
    memos.sort((a, b) => (Date.parse(b.memo.timestamp) || 0) - (Date.parse(a.memo.timestamp) || 0));

    const fragment = document.createDocumentFragment();
    memos.forEach(({ memo, index }) => {
      const item = document.createElement('div');
      item.className = 'memo-item';
      item.dataset.memoIndex = index;

      const content = document.createElement('p');
      content.className = 'memo-content';
      content.textContent = memo.content;

      const meta = document.createElement('div');
      meta.className = 'memo-meta';
      meta.textContent = new Date(memo.timestamp).toLocaleString();
      if (memo.fileUrl) {
        const link = document.createElement('a');
        link.href = '/?url=' + encodeURIComponent(memo.fileUrl);
        link.textContent = ' ' + memo.fileUrl.split('/').pop();
        meta.appendChild(link);
      }

      const form = document.createElement('div');
      form.className = 'memo-edit-form hidden';
      const textarea = document.createElement('textarea');
      textarea.value = memo.content;
      form.appendChild(textarea);

      const actions = document.createElement('div');
      actions.className = 'memo-actions';
      [['edit', 'Edit'], ['delete', 'Delete'], ['save', 'Save'], ['cancel', 'Cancel']].forEach(([action, label]) => {
        const btn = document.createElement('button');
        btn.dataset.action = action;
        btn.dataset.index = index;
        btn.textContent = label;
        if (action === 'save' || action === 'cancel') btn.classList.add('hidden');
        actions.appendChild(btn);
      });

      item.append(content, form, meta, actions);
      fragment.appendChild(item);
    });
    list.appendChild(fragment);
  }

  function toggleEditing(item, editing) {
    item.querySelector('.memo-content').classList.toggle('hidden', editing);
    item.querySelector('.memo-edit-form').classList.toggle('hidden', !editing);
    item.querySelectorAll('[data-action]').forEach(btn => {
      const forEdit = btn.dataset.action === 'save' || btn.dataset.action === 'cancel';
      btn.classList.toggle('hidden', forEdit !== editing);
    });
    if (editing) item.querySelector('textarea').focus();
  }

  list.addEventListener('click', event => {
    const button = event.target.closest('[data-action]');
    if (!button) return;
    const index = parseInt(button.dataset.index, 10);
    if (isNaN(index)) return;
    const item = button.closest('.memo-item');

    switch (button.dataset.action) {
      case 'edit':
        toggleEditing(item, true);
        break;
      case 'cancel':
        toggleEditing(item, false);
        break;
      case 'save': {
        const content = item.querySelector('textarea').value.trim();
        if (!content) { alert('Memo content is empty.'); return; }
        execute(commands.edit(index, content));
        break;
      }
      case 'delete':
        if (confirm('Delete this memo?')) execute(commands.remove(index));
        break;
    }
  });

  document.getElementById('addMemoBtn').addEventListener('click', () => {
    const content = prompt('Memo:');
    if (content && content.trim()) {
      execute(commands.add({
        id: Date.now(),
        content: content.trim(),
        timestamp: new Date().toISOString(),
        fileUrl: ''
      }));
    }
  });
  undoBtn.addEventListener('click', undo);

  render();
})();
"##;
