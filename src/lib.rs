pub mod core;
pub mod storage;
pub mod analysis;
pub mod schema;
pub mod index;
pub mod query;
pub mod search;
pub mod indexing;

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                               DOCDEX STRUCT ARCHITECTURE                                    │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────────── INDEX ──────────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                                 struct Index                                        │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ definition: IndexDefinition          // field analysis / storage rules       │ │    │
│  │  │ kind: Box<dyn IndexKind>             // map vs map/reduce policy              │ │    │
│  │  │ context: Arc<WorkContext>            // config, storage, error log           │ │    │
│  │  │ directory: RwLock<Arc<dyn Directory>>// memory tier, then disk tier          │ │    │
│  │  │ write_lock: Mutex<Option<IndexWriter>> // one writer, one write at a time    │ │    │
│  │  │ searcher_holder: IndexSearcherHolder // last published view                  │ │    │
│  │  │ extensions: RwLock<BTreeMap<..>>     // notified after each write            │ │    │
│  │  │ priority / last_query_time / last_index_time                                 │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│   write(mutator) ──► analyzer ──► "writing-to-index" lock ──► mutator(WriteSession)         │
│        │                                                        │                           │
│        │            ┌───────────── changed_docs > 0 ◄───────────┘                           │
│        │            ▼                                                                       │
│        │    storage stats ──► promote RAM ► disk? ──► commit ──► publish new IndexView      │
│        │                                                                                    │
│   query(options) ──► IndexQueryOperation ──► searcher guard ──► DuplicateDocumentRecorder   │
│   backup(dir)    ──► floating files under the write lock ──► snapshot commit ──► copy       │
│   dispose()      ──► extensions ──► drain searchers ──► close writer ──► close directory    │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────────── STORAGE ────────────────────────────────────────────┐
│                                                                                              │
│  ┌──────────────────────┐  ┌────────────────────────┐  ┌──────────────────────────────┐    │
│  │ trait Directory      │  │ struct CommitPoint     │  │ struct SnapshotDeletionPolicy│    │
│  │ • RamDirectory       │  │ • generation           │  │ • keep last commit           │    │
│  │ • FsDirectory        │  │ • segments: Vec<Info>  │  │ • pinned snapshots           │    │
│  │ • make_lock(name)    │  │ • segments_N + .gen    │  │ • snapshot / release         │    │
│  └──────────────────────┘  └────────────────────────┘  └──────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────────┐  ┌────────────────────────┐  ┌──────────────────────────────┐    │
│  │ struct IndexStorage  │  │ segment file _N.seg    │  │ trait StorageAccessor        │    │
│  │ • dir per index      │  │ • header + CRC32       │  │ • indexing / reduce stats    │    │
│  │ • version markers    │  │ • lz4(bincode(docs))   │  │ • references, tasks          │    │
│  │ • ram → disk copy    │  └────────────────────────┘  │ • last committed etag        │    │
│  └──────────────────────┘                              └──────────────────────────────┘    │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────────── SEARCH ─────────────────────────────────────────────┐
│                                                                                              │
│  IndexQuery ──► QueryBuilder (+ PerFieldAnalyzer) ──► IndexQueryTrigger* ──► Query AST      │
│                                                                                              │
│  IndexView::search ──► TopDocs ──► FieldsToFetch / create_document_from_fields              │
│                                    └──► IndexQueryResult { key, score, projection }         │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
