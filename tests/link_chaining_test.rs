//! End-to-end link chaining against a stub REST server.
//!
//! A query that follows a response link must issue exactly one call per
//! resolved field, with the link's arguments taken from the parent call.

use async_graphql::Request;
use oasgraph_openapi::{OpenApiGraph, Options, Schema};
use serde_json::json;

const LIBRARY: &str = r##"
openapi: 3.0.0
info:
  title: Library
  version: 1.0.0
servers:
  - url: http://unused.invalid
paths:
  /books:
    get:
      operationId: listBooks
      responses:
        '200':
          description: All books
          content:
            application/json:
              schema:
                type: array
                items:
                  $ref: '#/components/schemas/Book'
  /books/{bookId}:
    get:
      operationId: getBook
      parameters:
        - name: bookId
          in: path
          required: true
          schema:
            type: integer
      responses:
        '200':
          description: A book
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Book'
          links:
            author:
              operationId: getAuthor
              parameters:
                authorId: '$response.body#/author_id'
            sameShelf:
              operationRef: '#/paths/~1shelves~1{shelf}/get'
              parameters:
                shelf: 'shelf-{$response.body#/shelf_no}'
            reviews:
              operationId: getReviews
              parameters:
                bookId: $request.path.bookId
  /books/{bookId}/reviews:
    get:
      operationId: getReviews
      parameters:
        - name: bookId
          in: path
          required: true
          schema:
            type: integer
      responses:
        '200':
          description: Reviews of a book
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Reviews'
  /authors/{authorId}:
    get:
      operationId: getAuthor
      parameters:
        - name: authorId
          in: path
          required: true
          schema:
            type: integer
      responses:
        '200':
          description: An author
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Author'
  /shelves/{shelf}:
    get:
      operationId: getShelf
      parameters:
        - name: shelf
          in: path
          required: true
          schema:
            type: string
      responses:
        '200':
          description: A shelf
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Shelf'
components:
  schemas:
    Book:
      type: object
      properties:
        title:
          type: string
        author_id:
          type: integer
        shelf_no:
          type: integer
    Author:
      type: object
      properties:
        full_name:
          type: string
    Reviews:
      type: object
      properties:
        review_count:
          type: integer
    Shelf:
      type: object
      properties:
        label:
          type: string
"##;

fn build(base_url: String) -> Schema {
    let options = Options {
        base_url: Some(base_url),
        ..Options::default()
    };
    let (schema, report) = OpenApiGraph::from_str(LIBRARY)
        .unwrap()
        .with_options(options)
        .build()
        .unwrap();
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    schema
}

async fn execute(schema: &Schema, query: &str) -> serde_json::Value {
    let response = schema.execute(Request::new(query)).await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    response.data.into_json().unwrap()
}

#[tokio::test]
async fn test_link_issues_exactly_two_calls() {
    let mut server = mockito::Server::new_async().await;
    let book = server
        .mock("GET", "/books/1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"title": "Dune", "author_id": 5, "shelf_no": 3}"#)
        .expect(1)
        .create_async()
        .await;
    let author = server
        .mock("GET", "/authors/5")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"full_name": "Frank Herbert"}"#)
        .expect(1)
        .create_async()
        .await;

    let schema = build(server.url());
    let data = execute(&schema, "{ book(bookId: 1) { title author { fullName } } }").await;

    assert_eq!(
        data,
        json!({"book": {"title": "Dune", "author": {"fullName": "Frank Herbert"}}})
    );
    book.assert_async().await;
    author.assert_async().await;
}

#[tokio::test]
async fn test_link_bound_to_request_path() {
    let mut server = mockito::Server::new_async().await;
    let book = server
        .mock("GET", "/books/7")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"title": "Emma", "author_id": 6}"#)
        .expect(1)
        .create_async()
        .await;
    let reviews = server
        .mock("GET", "/books/7/reviews")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"review_count": 42}"#)
        .expect(1)
        .create_async()
        .await;

    let schema = build(server.url());
    let data = execute(&schema, "{ book(bookId: 7) { title reviews { reviewCount } } }").await;

    assert_eq!(
        data,
        json!({"book": {"title": "Emma", "reviews": {"reviewCount": 42}}})
    );
    book.assert_async().await;
    reviews.assert_async().await;
}

#[tokio::test]
async fn test_operation_ref_with_template_binding() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/books/1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"title": "Dune", "author_id": 5, "shelf_no": 3}"#)
        .create_async()
        .await;
    let shelf = server
        .mock("GET", "/shelves/shelf-3")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"label": "Science fiction"}"#)
        .expect(1)
        .create_async()
        .await;

    let schema = build(server.url());
    let data = execute(&schema, "{ book(bookId: 1) { sameShelf { label } } }").await;

    assert_eq!(data["book"]["sameShelf"]["label"], "Science fiction");
    shelf.assert_async().await;
}

#[tokio::test]
async fn test_links_on_list_items_bind_per_item() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/books")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"title": "Dune", "author_id": 5}, {"title": "Emma", "author_id": 6}]"#,
        )
        .expect(1)
        .create_async()
        .await;
    let herbert = server
        .mock("GET", "/authors/5")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"full_name": "Frank Herbert"}"#)
        .expect(1)
        .create_async()
        .await;
    let austen = server
        .mock("GET", "/authors/6")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"full_name": "Jane Austen"}"#)
        .expect(1)
        .create_async()
        .await;

    let schema = build(server.url());
    let data = execute(&schema, "{ booksList { title author { fullName } } }").await;

    assert_eq!(data["booksList"][0]["author"]["fullName"], "Frank Herbert");
    assert_eq!(data["booksList"][1]["author"]["fullName"], "Jane Austen");
    herbert.assert_async().await;
    austen.assert_async().await;
}
