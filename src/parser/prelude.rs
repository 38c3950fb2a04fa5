//! Built-in declarations parsed ahead of every program
//!
//! Fixtures `#include` the standard headers, which the lexer skips. The
//! typedefs, structs and constants those headers would provide are declared
//! here in C and lexed first; the macro table carries over into the user's
//! source and the two token streams are parsed as one translation unit.

use super::lexer::{LexError, Lexer, Token, TokenKind};

/// C text of the prelude. Only types and constants live here; the functions
/// themselves are built into the interpreter.
pub const PRELUDE: &str = r#"
typedef unsigned long size_t;
typedef long ssize_t;
typedef long off_t;
typedef long ptrdiff_t;
typedef unsigned int mode_t;

struct __krun_file {
    int fd;
    int eof;
    int error;
};
typedef struct __krun_file FILE;

struct dirent {
    unsigned long d_ino;
    unsigned char d_type;
    char d_name[256];
};

struct __krun_dir {
    int handle;
    struct dirent entry;
};
typedef struct __krun_dir DIR;

struct stat {
    unsigned long st_dev;
    unsigned long st_ino;
    unsigned long st_nlink;
    mode_t st_mode;
    unsigned int st_uid;
    unsigned int st_gid;
    off_t st_size;
    long st_blksize;
    long st_blocks;
};

#define EOF (-1)
#define BUFSIZ 1024
#define FILENAME_MAX 4096
#define PATH_MAX 4096
#define NAME_MAX 255
#define EXIT_SUCCESS 0
#define EXIT_FAILURE 1

#define stdin (__krun_stream(0))
#define stdout (__krun_stream(1))
#define stderr (__krun_stream(2))

#define O_RDONLY 0
#define O_WRONLY 1
#define O_RDWR 2
#define O_CREAT 64
#define O_TRUNC 512
#define O_APPEND 1024

#define SEEK_SET 0
#define SEEK_CUR 1
#define SEEK_END 2

#define DT_UNKNOWN 0
#define DT_FIFO 1
#define DT_CHR 2
#define DT_DIR 4
#define DT_BLK 6
#define DT_REG 8
#define DT_LNK 10
#define DT_SOCK 12

#define S_IFMT 0170000
#define S_IFDIR 0040000
#define S_IFREG 0100000
#define S_IFLNK 0120000
#define S_ISDIR(m) (((m) & S_IFMT) == S_IFDIR)
#define S_ISREG(m) (((m) & S_IFMT) == S_IFREG)
#define S_ISLNK(m) (((m) & S_IFMT) == S_IFLNK)

#define CHAR_BIT 8
#define SCHAR_MIN (-128)
#define SCHAR_MAX 127
#define UCHAR_MAX 255
#define CHAR_MIN (-128)
#define CHAR_MAX 127
#define SHRT_MIN (-32768)
#define SHRT_MAX 32767
#define USHRT_MAX 65535
#define INT_MIN (-2147483647 - 1)
#define INT_MAX 2147483647
#define UINT_MAX 4294967295U
#define LONG_MIN (-9223372036854775807L - 1)
#define LONG_MAX 9223372036854775807L
#define ULONG_MAX 18446744073709551615UL
"#;

/// Tokenize the prelude followed by `source`, as one stream ending in `Eof`.
///
/// Prelude tokens are reported at line 0 so diagnostics never point into it.
pub fn tokenize_with_prelude(source: &str) -> Result<Vec<Token>, LexError> {
    let mut prelude = Lexer::new(PRELUDE);
    let mut tokens: Vec<Token> = prelude
        .by_ref()
        .filter(|t| !matches!(t, Ok(Token { kind: TokenKind::Eof, .. })))
        .map(|t| t.map(|t| t.relocated(Default::default())))
        .collect::<Result<_, _>>()?;

    let mut lexer = Lexer::with_macros(source, prelude.into_macros());
    tokens.extend(lexer.tokenize()?);
    Ok(tokens)
}
